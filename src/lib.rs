//! Harmonic similarity between songs, measured on a Tonnetz.
//!
//! Each instrument's notes become weighted transitions between lattice
//! coordinates, bucketed by measure. Songs are compared by how many
//! transitions their instruments share, and instruments are paired across
//! songs by those scores.

pub mod comparison;
pub mod config;
pub mod error;
pub mod geometry;
pub mod instruments;
pub mod intervals;
pub mod lattice;
pub mod matrices;
pub mod notes;
pub mod similarity;
pub mod simmatrix;
pub mod song;
pub mod transitions;

pub use comparison::{compare, source_instrument_pairs, Comparison, InstrumentMatch, ScoreEntry, TrackPair};
pub use config::{AnalysisConfig, ComparisonConfig, TonnetzConfig};
pub use error::{Result, TonnetzError};
pub use geometry::{distance, rotate, Position};
pub use instruments::gm_instrument_name;
pub use intervals::{tonnetz_distance, TonnetzIntervals};
pub use lattice::{Lattice, LatticeCoord};
pub use matrices::{centralities, centrality, matrices, Centrality, MatrixKind};
pub use notes::{note_name, MidiByte, NoteInterval, Tick};
pub use similarity::{similarity, SimilarityMetric};
pub use simmatrix::{parallel_similarity_matrix, similarity_matrix, similarity_rows, SimilarityMatrix};
pub use song::{InstrumentInput, Song, SongInput};
pub use transitions::{analyze, PitchTransitionTable, Track, TrackKind, TransitionGraph, TransitionKey};
