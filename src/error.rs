use thiserror::Error;

use crate::intervals::TonnetzIntervals;
use crate::notes::{MidiByte, Tick};

pub type Result<T> = std::result::Result<T, TonnetzError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TonnetzError {
    #[error("no lattice distance table for Tonnetz intervals {intervals}")]
    UnsupportedIntervals { intervals: TonnetzIntervals },

    #[error("tracks have different subdivision counts: {left} vs {right}")]
    SubdivisionMismatch { left: usize, right: usize },

    #[error("invalid note interval: pitch {pitch}, start {start}, end {end}")]
    InvalidNoteInterval { pitch: MidiByte, start: Tick, end: Tick },

    #[error("invalid measure geometry: {ticks_per_measure} ticks per measure, {beats_per_measure} beats per measure")]
    InvalidMeasure { ticks_per_measure: Tick, beats_per_measure: usize },

    #[error("lattice start pitch {pitch} is outside the MIDI range")]
    InvalidStartPitch { pitch: MidiByte },

    #[error("lattice pitch at ({col}, {row}) overflows")]
    PitchOverflow { col: usize, row: usize },

    #[error("eigenvector centrality did not converge within {iterations} iterations")]
    CentralityConvergence { iterations: usize },

    #[error("row range {from}..{to} is outside a corpus of {len} songs")]
    InvalidRowRange { from: usize, to: usize, len: usize },
}
