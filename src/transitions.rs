use std::collections::BTreeMap;

use log::{debug, trace};

use crate::error::{Result, TonnetzError};
use crate::lattice::{Lattice, LatticeCoord};
use crate::notes::{group_chords, MidiByte, NoteInterval, Tick};

/// Transitions whose nearest landing coordinate is this far away or more are
/// left out of the lattice graph.
pub const MAX_TRANSITION_DISTANCE: f64 = 4.0;

/// A track needs this many distinct lattice transitions in at least one
/// subdivision to be worth comparing.
pub const MIN_TRANSITIONS_PER_SUBDIVISION: usize = 4;

/// Directed: `(a, b)` and `(b, a)` are different keys.
pub type TransitionKey = (LatticeCoord, LatticeCoord);
pub type PitchTransition = (MidiByte, MidiByte);
pub type TransitionGraph = BTreeMap<TransitionKey, f64>;
pub type PitchTransitionTable = BTreeMap<PitchTransition, f64>;

/// How transitions are bucketed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TrackKind {
    /// Everything lands in one bucket.
    Sequence,
    /// `beats_per_measure` buckets, cycling once per `ticks_per_measure`.
    Quarter { ticks_per_measure: Tick, beats_per_measure: usize },
}

impl TrackKind {
    pub fn quarter(ticks_per_measure: Tick, beats_per_measure: usize) -> Result<Self> {
        let kind = TrackKind::Quarter {ticks_per_measure, beats_per_measure};
        kind.validate()?;
        Ok(kind)
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            TrackKind::Quarter {ticks_per_measure, beats_per_measure} if ticks_per_measure == 0 || beats_per_measure == 0 => {
                Err(TonnetzError::InvalidMeasure {ticks_per_measure, beats_per_measure})
            }
            _ => Ok(()),
        }
    }

    pub fn subdivisions(&self) -> usize {
        match self {
            TrackKind::Sequence => 1,
            TrackKind::Quarter {beats_per_measure, ..} => *beats_per_measure,
        }
    }

    /// Slots advance one per whole measure and wrap every `beats_per_measure`
    /// measures; position within a measure is ignored.
    pub fn slot_for(&self, tick: Tick) -> usize {
        match self {
            TrackKind::Sequence => 0,
            TrackKind::Quarter {ticks_per_measure, beats_per_measure} => {
                ((tick / ticks_per_measure) % *beats_per_measure as Tick) as usize
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackAnalysis {
    pub graphs: Vec<TransitionGraph>,
    pub pitch_tables: Vec<PitchTransitionTable>,
    pub has_enough_data: bool,
}

fn has_enough_data(graphs: &[TransitionGraph]) -> bool {
    graphs.iter().any(|g| g.len() >= MIN_TRANSITIONS_PER_SUBDIVISION)
}

fn add_weight<K: Ord>(table: &mut BTreeMap<K, f64>, key: K, weight: f64) {
    *table.entry(key).or_insert(0.0) += weight;
}

/// Builds per-subdivision transition tables from one instrument's notes.
///
/// Consecutive chords contribute every pitch pair `(p, q)` with `p != q`.
/// Each pair weighs `1 / pairs_in_chord_step / total_notes`, so dense chords
/// don't dominate and long tracks don't outweigh short ones. Pairs with a
/// pitch absent from `lattice` are dropped. For each coordinate of `p`, the
/// nearest coordinate of `q` receives the weight if it is close enough.
pub fn analyze(notes: &[NoteInterval], kind: TrackKind, lattice: &Lattice) -> Result<TrackAnalysis> {
    kind.validate()?;
    let subdivisions = kind.subdivisions();
    let mut graphs = vec![TransitionGraph::new(); subdivisions];
    let mut pitch_tables = vec![PitchTransitionTable::new(); subdivisions];

    let chords = group_chords(notes)?;
    let total_notes = notes.len() as f64;
    for step in chords.windows(2) {
        let (prev, curr) = (&step[0], &step[1]);
        let candidates: Vec<PitchTransition> = prev
            .pitches()
            .iter()
            .flat_map(|p| curr.pitches().iter().filter(move |q| *q != p).map(move |q| (*p, *q)))
            .collect();
        if candidates.is_empty() {
            continue;
        }
        let weight = (1.0 / candidates.len() as f64) / total_notes;
        let slot = kind.slot_for(prev.start());

        for (p, q) in candidates {
            if !lattice.contains_pitch(p) || !lattice.contains_pitch(q) {
                trace!("skipping {p}->{q} at tick {}: pitch not on lattice", prev.start());
                continue;
            }
            add_weight(&mut pitch_tables[slot], (p, q), weight);
            let landings = lattice.coords_for(q);
            for from in lattice.coords_for(p) {
                if let Some((to, dist)) = lattice.nearest(*from, landings) {
                    if dist < MAX_TRANSITION_DISTANCE {
                        add_weight(&mut graphs[slot], (*from, to), weight);
                    }
                }
            }
        }
    }

    let has_enough_data = has_enough_data(&graphs);
    Ok(TrackAnalysis {graphs, pitch_tables, has_enough_data})
}

/// One analysed instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    instrument: String,
    kind: TrackKind,
    graphs: Vec<TransitionGraph>,
    pitch_tables: Vec<PitchTransitionTable>,
    has_enough_data: bool,
}

impl Track {
    pub fn analyze(instrument: &str, notes: &[NoteInterval], kind: TrackKind, lattice: &Lattice) -> Result<Self> {
        let analysis = analyze(notes, kind, lattice)?;
        debug!(
            "{instrument}: {} notes, {} lattice transitions over {} subdivisions, enough data: {}",
            notes.len(),
            analysis.graphs.iter().map(|g| g.len()).sum::<usize>(),
            kind.subdivisions(),
            analysis.has_enough_data
        );
        Ok(Track {
            instrument: instrument.to_owned(),
            kind,
            graphs: analysis.graphs,
            pitch_tables: analysis.pitch_tables,
            has_enough_data: analysis.has_enough_data,
        })
    }

    /// Rebuilds a track from previously stored tables.
    pub fn from_tables(instrument: &str, kind: TrackKind, graphs: Vec<TransitionGraph>, pitch_tables: Vec<PitchTransitionTable>) -> Result<Self> {
        kind.validate()?;
        for len in [graphs.len(), pitch_tables.len()] {
            if len != kind.subdivisions() {
                return Err(TonnetzError::SubdivisionMismatch {left: kind.subdivisions(), right: len});
            }
        }
        let has_enough_data = has_enough_data(&graphs);
        Ok(Track {instrument: instrument.to_owned(), kind, graphs, pitch_tables, has_enough_data})
    }

    pub fn instrument(&self) -> &str {&self.instrument}

    pub fn kind(&self) -> TrackKind {self.kind}

    pub fn subdivisions(&self) -> usize {self.graphs.len()}

    pub fn graphs(&self) -> &[TransitionGraph] {&self.graphs}

    pub fn pitch_tables(&self) -> &[PitchTransitionTable] {&self.pitch_tables}

    pub fn has_enough_data(&self) -> bool {self.has_enough_data}
}
