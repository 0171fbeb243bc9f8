use std::collections::BTreeSet;

use enum_iterator::Sequence;
use ndarray::{Array1, Array2, ArrayView1};

use crate::error::{Result, TonnetzError};
use crate::intervals::{supports_distance, tonnetz_distance, TonnetzIntervals};
use crate::lattice::Lattice;
use crate::matrices::{matrix, MatrixKind};
use crate::notes::MidiByte;
use crate::transitions::{PitchTransitionTable, Track};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Sequence, Hash)]
pub enum SimilarityMetric {
    WeightedOverlap,
    UnweightedOverlap,
    Jaccard,
    LaplacianCosine,
}

fn check_subdivisions(a: &Track, b: &Track) -> Result<()> {
    if a.subdivisions() != b.subdivisions() {
        Err(TonnetzError::SubdivisionMismatch {left: a.subdivisions(), right: b.subdivisions()})
    } else {
        Ok(())
    }
}

/// Sums `distance * (1 - |wa - wb|) * max(wa, wb)` over transitions present
/// in both tables. `offset` shifts `b`'s pitches; `intervals` selects the
/// lattice-distance factor, `None` makes every shared transition count 1.
pub fn transition_overlap(a: &PitchTransitionTable, b: &PitchTransitionTable, offset: MidiByte, intervals: Option<TonnetzIntervals>) -> Result<f64> {
    if let Some(intervals) = intervals {
        if !supports_distance(intervals) {
            return Err(TonnetzError::UnsupportedIntervals {intervals});
        }
    }
    let mut similarity = 0.0;
    for ((p, q), weight_a) in a.iter() {
        let shifted = match (p.checked_add(offset), q.checked_add(offset)) {
            (Some(p), Some(q)) => (p, q),
            _ => continue,
        };
        if let Some(weight_b) = b.get(&shifted) {
            let distance = match intervals {
                Some(intervals) => tonnetz_distance(*p, *q, intervals)?,
                None => 1.0,
            };
            similarity += distance * (1.0 - (weight_a - weight_b).abs()) * weight_a.max(*weight_b);
        }
    }
    Ok(similarity)
}

/// Per-subdivision lattice-distance-weighted overlap.
pub fn weighted_overlap_by_subdivision(a: &Track, b: &Track, offset: MidiByte, intervals: TonnetzIntervals) -> Result<Vec<f64>> {
    check_subdivisions(a, b)?;
    a.pitch_tables()
        .iter()
        .zip(b.pitch_tables().iter())
        .map(|(ta, tb)| transition_overlap(ta, tb, offset, Some(intervals)))
        .collect()
}

pub fn unweighted_overlap_by_subdivision(a: &Track, b: &Track, offset: MidiByte) -> Result<Vec<f64>> {
    check_subdivisions(a, b)?;
    a.pitch_tables()
        .iter()
        .zip(b.pitch_tables().iter())
        .map(|(ta, tb)| transition_overlap(ta, tb, offset, None))
        .collect()
}

pub fn weighted_overlap(a: &Track, b: &Track, offset: MidiByte, intervals: TonnetzIntervals) -> Result<f64> {
    Ok(weighted_overlap_by_subdivision(a, b, offset, intervals)?.iter().sum())
}

pub fn unweighted_overlap(a: &Track, b: &Track, offset: MidiByte) -> Result<f64> {
    Ok(unweighted_overlap_by_subdivision(a, b, offset)?.iter().sum())
}

/// Shared transitions over all transitions. Two empty tables score 0.
pub fn jaccard_similarity(a: &PitchTransitionTable, b: &PitchTransitionTable) -> f64 {
    let keys_a: BTreeSet<_> = a.keys().collect();
    let keys_b: BTreeSet<_> = b.keys().collect();
    let union = keys_a.union(&keys_b).count();
    if union == 0 {
        0.0
    } else {
        keys_a.intersection(&keys_b).count() as f64 / union as f64
    }
}

pub fn track_jaccard(a: &Track, b: &Track) -> Result<f64> {
    check_subdivisions(a, b)?;
    Ok(a.pitch_tables()
        .iter()
        .zip(b.pitch_tables().iter())
        .map(|(ta, tb)| jaccard_similarity(ta, tb))
        .sum())
}

/// Zero when either vector has no length.
pub fn cosine_similarity(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let denom = a.dot(&a).sqrt() * b.dot(&b).sqrt();
    if denom > 0.0 {
        a.dot(&b) / denom
    } else {
        0.0
    }
}

fn flattened(m: &Array2<f64>) -> Array1<f64> {
    m.iter().copied().collect()
}

/// Cosine of each subdivision's flattened Laplacians, each normalized on its
/// own, summed.
pub fn laplacian_cosine(a: &Track, b: &Track, lattice: &Lattice) -> Result<f64> {
    check_subdivisions(a, b)?;
    Ok(a.graphs()
        .iter()
        .zip(b.graphs().iter())
        .map(|(ga, gb)| {
            let la = matrix(ga, lattice, MatrixKind::Laplacian);
            let lb = matrix(gb, lattice, MatrixKind::Laplacian);
            cosine_similarity(flattened(&la).view(), flattened(&lb).view())
        })
        .sum())
}

/// Scores two tracks analysed on `lattice` without any pitch offset.
pub fn similarity(a: &Track, b: &Track, metric: SimilarityMetric, lattice: &Lattice) -> Result<f64> {
    match metric {
        SimilarityMetric::WeightedOverlap => weighted_overlap(a, b, 0, lattice.config().intervals),
        SimilarityMetric::UnweightedOverlap => unweighted_overlap(a, b, 0),
        SimilarityMetric::Jaccard => track_jaccard(a, b),
        SimilarityMetric::LaplacianCosine => laplacian_cosine(a, b, lattice),
    }
}
