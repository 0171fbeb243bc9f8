use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

use float_cmp::approx_eq;
use lazy_static::lazy_static;
use log::debug;

use crate::config::TonnetzConfig;
use crate::error::{Result, TonnetzError};
use crate::geometry::{self, Layout, Position};
use crate::notes::{note_name, MidiByte};

const LAYOUT_ROTATION_DEGREES: f64 = 30.0;

/// Distances closer than this are the same distance. The layout rotation
/// leaves rounding noise well below it.
const DISTANCE_TOLERANCE: f64 = 1e-9;

/// A lattice node. Ordered by row, then column, which is the order the
/// pitch sweep visits nodes in.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct LatticeCoord {
    pub col: usize,
    pub row: usize,
}

impl LatticeCoord {
    pub fn new(col: usize, row: usize) -> Self {
        LatticeCoord {col, row}
    }
}

impl Ord for LatticeCoord {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.row, self.col).cmp(&(other.row, other.col))
    }
}

impl PartialOrd for LatticeCoord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for LatticeCoord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

lazy_static! {
    static ref LATTICE_CACHE: Mutex<HashMap<TonnetzConfig, Arc<Lattice>>> = Mutex::new(HashMap::new());
}

/// A Tonnetz: a triangular lattice whose nodes carry absolute pitch numbers.
/// Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Lattice {
    config: TonnetzConfig,
    nodes: Vec<LatticeCoord>,
    index: BTreeMap<LatticeCoord, usize>,
    neighbors: BTreeMap<LatticeCoord, BTreeSet<LatticeCoord>>,
    layout: Layout,
    pitches: BTreeMap<LatticeCoord, MidiByte>,
    coords_by_pitch: BTreeMap<MidiByte, Vec<LatticeCoord>>,
}

impl Lattice {
    pub fn new(config: &TonnetzConfig) -> Result<Self> {
        config.validate()?;
        let (neighbors, layout) = triangular_lattice(config.extent.0, config.extent.1);
        let nodes: Vec<LatticeCoord> = neighbors.keys().copied().collect();
        let index = nodes.iter().enumerate().map(|(i, c)| (*c, i)).collect();
        let layout = geometry::rotate_layout(&layout, LAYOUT_ROTATION_DEGREES);
        let mut lattice = Lattice {
            config: *config,
            nodes,
            index,
            neighbors,
            layout,
            pitches: BTreeMap::new(),
            coords_by_pitch: BTreeMap::new(),
        };
        lattice.assign_pitches()?;
        debug!("built {}-node lattice for {:?}", lattice.len(), config);
        Ok(lattice)
    }

    /// The lattice for `config`, built on first request and shared afterwards.
    pub fn shared(config: &TonnetzConfig) -> Result<Arc<Lattice>> {
        let mut cache = LATTICE_CACHE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(lattice) = cache.get(config) {
            return Ok(lattice.clone());
        }
        let lattice = Arc::new(Lattice::new(config)?);
        cache.insert(*config, lattice.clone());
        Ok(lattice)
    }

    // Walks nodes row by row. Each row starts a fixed step above the previous
    // row's start and descends by the horizontal interval from there.
    fn assign_pitches(&mut self) -> Result<()> {
        let intervals = self.config.intervals;
        let mut row_start = self.config.start_pitch;
        let mut current_row = 0;
        for coord in self.nodes.iter() {
            let overflow = TonnetzError::PitchOverflow {col: coord.col, row: coord.row};
            if coord.row > current_row {
                current_row = coord.row;
                let step = if current_row % 2 == 1 {
                    intervals.odd_row_step()
                } else {
                    intervals.even_row_step()
                };
                row_start = step.and_then(|s| row_start.checked_add(s)).ok_or(overflow.clone())?;
            }
            let pitch = MidiByte::try_from(coord.col)
                .ok()
                .and_then(|col| col.checked_mul(intervals.horizontal()))
                .and_then(|offset| row_start.checked_sub(offset))
                .ok_or(overflow)?;
            self.pitches.insert(*coord, pitch);
            self.coords_by_pitch.entry(pitch).or_default().push(*coord);
        }
        Ok(())
    }

    pub fn config(&self) -> &TonnetzConfig {&self.config}

    pub fn nodes(&self) -> &[LatticeCoord] {&self.nodes}

    pub fn len(&self) -> usize {self.nodes.len()}

    pub fn is_empty(&self) -> bool {self.nodes.is_empty()}

    pub fn node_index(&self, coord: LatticeCoord) -> Option<usize> {
        self.index.get(&coord).copied()
    }

    pub fn neighbors(&self, coord: LatticeCoord) -> impl Iterator<Item = LatticeCoord> + '_ {
        self.neighbors.get(&coord).into_iter().flat_map(|n| n.iter().copied())
    }

    pub fn are_adjacent(&self, a: LatticeCoord, b: LatticeCoord) -> bool {
        self.neighbors.get(&a).map_or(false, |n| n.contains(&b))
    }

    /// Each undirected edge once, smaller endpoint first.
    pub fn edges(&self) -> impl Iterator<Item = (LatticeCoord, LatticeCoord)> + '_ {
        self.neighbors
            .iter()
            .flat_map(|(a, ns)| ns.iter().filter(move |b| a < *b).map(move |b| (*a, *b)))
    }

    pub fn edge_count(&self) -> usize {
        self.neighbors.values().map(|n| n.len()).sum::<usize>() / 2
    }

    pub fn layout(&self) -> &Layout {&self.layout}

    pub fn position(&self, coord: LatticeCoord) -> Option<Position> {
        self.layout.get(&coord).copied()
    }

    pub fn distance(&self, a: LatticeCoord, b: LatticeCoord) -> Option<f64> {
        geometry::distance(a, b, &self.layout)
    }

    pub fn pitch_at(&self, coord: LatticeCoord) -> Option<MidiByte> {
        self.pitches.get(&coord).copied()
    }

    pub fn pitches(&self) -> &BTreeMap<LatticeCoord, MidiByte> {&self.pitches}

    /// Every coordinate carrying `pitch`, in sweep order.
    pub fn coords_for(&self, pitch: MidiByte) -> &[LatticeCoord] {
        self.coords_by_pitch.get(&pitch).map(|c| c.as_slice()).unwrap_or(&[])
    }

    pub fn contains_pitch(&self, pitch: MidiByte) -> bool {
        self.coords_by_pitch.contains_key(&pitch)
    }

    pub fn coords_by_pitch(&self) -> &BTreeMap<MidiByte, Vec<LatticeCoord>> {&self.coords_by_pitch}

    pub fn note_name(&self, coord: LatticeCoord) -> Option<String> {
        self.pitch_at(coord).map(note_name)
    }

    /// The candidate closest to `from`, with its distance. Ties, up to
    /// rounding noise, go to the earliest candidate.
    pub fn nearest(&self, from: LatticeCoord, candidates: &[LatticeCoord]) -> Option<(LatticeCoord, f64)> {
        candidates
            .iter()
            .filter_map(|c| self.distance(from, *c).map(|d| (*c, d)))
            .fold(None, |best, (c, d)| match best {
                Some((_, best_d)) if d > best_d || approx_eq!(f64, d, best_d, epsilon = DISTANCE_TOLERANCE) => best,
                _ => Some((c, d)),
            })
    }
}

fn add_edge(neighbors: &mut BTreeMap<LatticeCoord, BTreeSet<LatticeCoord>>, a: LatticeCoord, b: LatticeCoord) {
    neighbors.entry(a).or_default().insert(b);
    neighbors.entry(b).or_default().insert(a);
}

/// Triangular lattice with `rows + 1` rows of `(cols + 1) / 2 + 1` nodes,
/// odd rows shifted half a step right. When `cols` is odd the last node of
/// every odd row is dropped.
fn triangular_lattice(rows: usize, cols: usize) -> (BTreeMap<LatticeCoord, BTreeSet<LatticeCoord>>, Layout) {
    let mut neighbors = BTreeMap::new();
    let mut layout = Layout::new();
    if rows == 0 || cols == 0 {
        return (neighbors, layout);
    }
    let width = (cols + 1) / 2;

    for j in 0..=rows {
        for i in 0..width {
            add_edge(&mut neighbors, LatticeCoord::new(i, j), LatticeCoord::new(i + 1, j));
        }
    }
    for j in 0..rows {
        for i in 0..=width {
            add_edge(&mut neighbors, LatticeCoord::new(i, j), LatticeCoord::new(i, j + 1));
        }
    }
    for j in (1..rows).step_by(2) {
        for i in 0..width {
            add_edge(&mut neighbors, LatticeCoord::new(i, j), LatticeCoord::new(i + 1, j + 1));
        }
    }
    for j in (0..rows).step_by(2) {
        for i in 0..width {
            add_edge(&mut neighbors, LatticeCoord::new(i + 1, j), LatticeCoord::new(i, j + 1));
        }
    }

    if cols % 2 == 1 {
        for j in (1..=rows).step_by(2) {
            let removed = LatticeCoord::new(width, j);
            if let Some(adjacent) = neighbors.remove(&removed) {
                for other in adjacent {
                    if let Some(ns) = neighbors.get_mut(&other) {
                        ns.remove(&removed);
                    }
                }
            }
        }
    }

    let height = 3.0_f64.sqrt() / 2.0;
    for coord in neighbors.keys() {
        let x = coord.col as f64 + 0.5 * (coord.row % 2) as f64;
        let y = height * coord.row as f64;
        layout.insert(*coord, Position::new(x, y));
    }
    (neighbors, layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intervals::TonnetzIntervals;
    use float_cmp::approx_eq;

    fn reference_lattice() -> Lattice {
        Lattice::new(&TonnetzConfig {intervals: TonnetzIntervals(3, 4, 5), extent: (12, 24), start_pitch: 57}).unwrap()
    }

    #[test]
    fn test_topology() {
        let lattice = reference_lattice();
        assert_eq!(lattice.len(), 13 * 13);
        // 13 rows of 12 horizontal edges, 12 gaps of 13 verticals and 12 diagonals
        assert_eq!(lattice.edge_count(), 13 * 12 + 12 * 13 + 12 * 12);
        assert_eq!(lattice.neighbors(LatticeCoord::new(5, 5)).count(), 6);
        assert_eq!(lattice.neighbors(LatticeCoord::new(6, 8)).count(), 6);
        assert_eq!(lattice.neighbors(LatticeCoord::new(0, 0)).count(), 2);
        assert!(lattice.are_adjacent(LatticeCoord::new(0, 0), LatticeCoord::new(0, 1)));
        assert!(lattice.are_adjacent(LatticeCoord::new(1, 0), LatticeCoord::new(0, 1)));
        assert!(lattice.are_adjacent(LatticeCoord::new(0, 1), LatticeCoord::new(1, 2)));
        assert!(!lattice.are_adjacent(LatticeCoord::new(0, 0), LatticeCoord::new(1, 1)));
    }

    #[test]
    fn test_odd_extent_drops_row_ends() {
        let lattice = Lattice::new(&TonnetzConfig {extent: (2, 3), ..TonnetzConfig::default()}).unwrap();
        assert_eq!(lattice.len(), 3 + 2 + 3);
        assert_eq!(lattice.node_index(LatticeCoord::new(2, 1)), None);
        assert!(Lattice::new(&TonnetzConfig {extent: (0, 4), ..TonnetzConfig::default()}).unwrap().is_empty());
    }

    #[test]
    fn test_every_neighbor_is_one_step_away() {
        let lattice = reference_lattice();
        for (a, b) in lattice.edges() {
            assert!(approx_eq!(f64, lattice.distance(a, b).unwrap(), 1.0, epsilon = 1e-9));
        }
    }

    #[test]
    fn test_pitch_sweep() {
        let lattice = reference_lattice();
        assert_eq!(lattice.pitch_at(LatticeCoord::new(0, 0)), Some(57));
        assert_eq!(lattice.pitch_at(LatticeCoord::new(1, 0)), Some(54));
        assert_eq!(lattice.pitch_at(LatticeCoord::new(12, 0)), Some(21));
        assert_eq!(lattice.pitch_at(LatticeCoord::new(0, 1)), Some(61));
        assert_eq!(lattice.pitch_at(LatticeCoord::new(2, 1)), Some(55));
        assert_eq!(lattice.pitch_at(LatticeCoord::new(0, 2)), Some(68));
        assert_eq!(lattice.pitch_at(LatticeCoord::new(0, 3)), Some(72));
        assert_eq!(lattice.note_name(LatticeCoord::new(0, 0)), Some("A3".to_string()));
        // Every triangle is a triad: a vertical step is a major or minor third away
        for coord in lattice.nodes().iter().filter(|c| c.row % 2 == 0 && c.row < 12) {
            let up = LatticeCoord::new(coord.col, coord.row + 1);
            let diff = lattice.pitch_at(up).unwrap() - lattice.pitch_at(*coord).unwrap();
            assert_eq!(diff, 4);
        }
    }

    #[test]
    fn test_pitch_coverage() {
        for start in [0, 45, 57, 60] {
            let lattice = Lattice::new(&TonnetzConfig {start_pitch: start, ..TonnetzConfig::default()}).unwrap();
            assert_eq!(lattice.pitches().len(), lattice.len());
            let mut covered: Vec<LatticeCoord> = lattice.coords_by_pitch().values().flatten().copied().collect();
            covered.sort();
            assert_eq!(covered.as_slice(), lattice.nodes());
            for (pitch, coords) in lattice.coords_by_pitch() {
                for c in coords {
                    assert_eq!(lattice.pitch_at(*c), Some(*pitch));
                }
            }
        }
    }

    #[test]
    fn test_determinism_and_cache() {
        let a = reference_lattice();
        let b = reference_lattice();
        assert_eq!(a, b);
        assert_eq!(a.edges().collect::<Vec<_>>(), b.edges().collect::<Vec<_>>());

        let shared1 = Lattice::shared(&TonnetzConfig::default()).unwrap();
        let shared2 = Lattice::shared(&TonnetzConfig::default()).unwrap();
        assert!(Arc::ptr_eq(&shared1, &shared2));
        assert_eq!(*shared1, a);
    }

    #[test]
    fn test_nearest_prefers_first_on_tie() {
        let lattice = reference_lattice();
        let origin = LatticeCoord::new(5, 4);
        let left = LatticeCoord::new(4, 4);
        let right = LatticeCoord::new(6, 4);
        assert_eq!(lattice.nearest(origin, &[left, right]).map(|(c, _)| c), Some(left));
        assert_eq!(lattice.nearest(origin, &[right, left]).map(|(c, _)| c), Some(right));
        assert_eq!(lattice.nearest(origin, &[]), None);
    }

    #[test]
    fn test_nearest_ignores_rounding_noise() {
        let lattice = reference_lattice();
        let origin = LatticeCoord::new(5, 4);
        let ring: Vec<LatticeCoord> = lattice.neighbors(origin).collect();
        assert_eq!(ring.len(), 6);
        for first in 0..ring.len() {
            let mut rotated = ring.clone();
            rotated.rotate_left(first);
            let (nearest, d) = lattice.nearest(origin, &rotated).unwrap();
            assert_eq!(nearest, rotated[0]);
            assert!(approx_eq!(f64, d, 1.0, epsilon = 1e-9));
        }
    }

    #[test]
    fn test_bad_start_pitch() {
        for pitch in [-1, 128, MidiByte::MAX, MidiByte::MIN] {
            let config = TonnetzConfig {start_pitch: pitch, ..TonnetzConfig::default()};
            assert_eq!(Lattice::new(&config), Err(TonnetzError::InvalidStartPitch {pitch}));
            assert!(Lattice::shared(&config).is_err());
        }
    }

    #[test]
    fn test_pitch_overflow() {
        let wide = TonnetzConfig {intervals: TonnetzIntervals(3, 20000, 5), ..TonnetzConfig::default()};
        assert!(matches!(Lattice::new(&wide), Err(TonnetzError::PitchOverflow {..})));
        let steep = TonnetzConfig {intervals: TonnetzIntervals(MidiByte::MAX, 4, 5), ..TonnetzConfig::default()};
        assert_eq!(Lattice::new(&steep), Err(TonnetzError::PitchOverflow {col: 2, row: 0}));
        let low = TonnetzConfig {intervals: TonnetzIntervals(3, 4, MidiByte::MIN), ..TonnetzConfig::default()};
        assert_eq!(Lattice::new(&low), Err(TonnetzError::PitchOverflow {col: 0, row: 2}));
    }
}
