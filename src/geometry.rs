use std::collections::BTreeMap;

use crate::lattice::LatticeCoord;

pub type Layout = BTreeMap<LatticeCoord, Position>;

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Position {x, y}
    }

    /// Rotates clockwise about the origin.
    pub fn rotated(&self, degrees: f64) -> Self {
        let (sin, cos) = (-degrees).to_radians().sin_cos();
        Position {
            x: self.x * cos - self.y * sin,
            y: self.y * cos + self.x * sin,
        }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

pub fn rotate(position: Position, degrees: f64) -> Position {
    position.rotated(degrees)
}

pub fn rotate_layout(layout: &Layout, degrees: f64) -> Layout {
    layout.iter().map(|(coord, p)| (*coord, p.rotated(degrees))).collect()
}

/// Euclidean distance between two coordinates' layout positions.
/// Returns `None` when either coordinate has no position.
pub fn distance(a: LatticeCoord, b: LatticeCoord, layout: &Layout) -> Option<f64> {
    Some(layout.get(&a)?.distance_to(layout.get(&b)?))
}
