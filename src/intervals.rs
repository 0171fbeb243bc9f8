use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use bare_metal_modulo::{MNum, ModNumC};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TonnetzError};
use crate::notes::{MidiByte, NOTES_PER_OCTAVE, USIZE_NOTES_PER_OCTAVE};

/// Lattice steps added per octave of separation.
const OCTAVE_DISTANCE: MidiByte = 3;

/// Semitone steps along the three lattice axes: horizontal (descending),
/// odd-row ascent, and the complement of the even-row ascent.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TonnetzIntervals(pub MidiByte, pub MidiByte, pub MidiByte);

impl TonnetzIntervals {
    pub const MINOR_MAJOR_FOURTH: TonnetzIntervals = TonnetzIntervals(3, 4, 5);

    pub fn horizontal(&self) -> MidiByte {self.0}

    pub fn odd_row_step(&self) -> Option<MidiByte> {Some(self.1)}

    pub fn even_row_step(&self) -> Option<MidiByte> {NOTES_PER_OCTAVE.checked_sub(self.2)}
}

impl Default for TonnetzIntervals {
    fn default() -> Self {
        Self::MINOR_MAJOR_FOURTH
    }
}

impl Display for TonnetzIntervals {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.0, self.1, self.2)
    }
}

lazy_static! {
    /// Lattice steps between two pitch classes, indexed by semitone difference.
    static ref DIST_LOOKUP: BTreeMap<TonnetzIntervals, [MidiByte; USIZE_NOTES_PER_OCTAVE]> = {
        let mut table = BTreeMap::new();
        table.insert(TonnetzIntervals::MINOR_MAJOR_FOURTH, [0, 2, 2, 1, 1, 1, 2, 1, 1, 1, 2, 2]);
        table
    };
}

pub fn supports_distance(intervals: TonnetzIntervals) -> bool {
    DIST_LOOKUP.contains_key(&intervals)
}

/// Number of lattice steps between two pitches, counting three extra steps
/// per whole octave of separation.
pub fn tonnetz_distance(p1: MidiByte, p2: MidiByte, intervals: TonnetzIntervals) -> Result<f64> {
    let table = DIST_LOOKUP
        .get(&intervals)
        .ok_or(TonnetzError::UnsupportedIntervals {intervals})?;
    let diff = (p1 - p2).abs();
    let class: ModNumC<MidiByte, USIZE_NOTES_PER_OCTAVE> = ModNumC::new(diff);
    let octaves = diff / NOTES_PER_OCTAVE;
    Ok((table[class.a() as usize] + OCTAVE_DISTANCE * octaves) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_third() {
        assert_eq!(tonnetz_distance(60, 64, TonnetzIntervals(3, 4, 5)), Ok(1.0));
        assert_eq!(tonnetz_distance(64, 60, TonnetzIntervals(3, 4, 5)), Ok(1.0));
    }

    #[test]
    fn test_table_and_octaves() {
        let expected = [0, 2, 2, 1, 1, 1, 2, 1, 1, 1, 2, 2];
        for (diff, dist) in expected.iter().enumerate() {
            let diff = diff as MidiByte;
            assert_eq!(tonnetz_distance(48, 48 + diff, TonnetzIntervals::default()), Ok(*dist as f64));
            assert_eq!(tonnetz_distance(48, 60 + diff, TonnetzIntervals::default()), Ok((*dist + 3) as f64));
            assert_eq!(tonnetz_distance(48, 72 + diff, TonnetzIntervals::default()), Ok((*dist + 6) as f64));
        }
    }

    #[test]
    fn test_unsupported() {
        let intervals = TonnetzIntervals(2, 3, 7);
        assert!(!supports_distance(intervals));
        assert_eq!(tonnetz_distance(60, 62, intervals), Err(TonnetzError::UnsupportedIntervals {intervals}));
        assert_eq!(intervals.to_string(), "(2, 3, 7)");
    }
}
