use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

use log::debug;
use ordered_float::OrderedFloat;

use crate::config::ComparisonConfig;
use crate::error::Result;
use crate::similarity::{unweighted_overlap_by_subdivision, weighted_overlap_by_subdivision};
use crate::song::{check_track_subdivisions, Song};

/// Track indices, first song then second song.
pub type TrackPair = (usize, usize);

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScoreEntry {
    pub subdivision: usize,
    pub tracks: TrackPair,
    pub score: f64,
}

/// A pairing chosen by `Comparison::best_instrument_matches`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct InstrumentMatch {
    pub tracks: TrackPair,
    pub score: f64,
}

/// Per-subdivision scores for every compared track pair of two songs.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    songs: (String, String),
    scores: Vec<BTreeMap<TrackPair, f64>>,
    total_score: f64,
}

impl Comparison {
    pub fn from_scores(songs: (String, String), scores: Vec<BTreeMap<TrackPair, f64>>) -> Self {
        let total_score = scores.iter().flat_map(|s| s.values()).sum();
        Comparison {songs, scores, total_score}
    }

    pub fn songs(&self) -> (&str, &str) {(&self.songs.0, &self.songs.1)}

    pub fn scores(&self) -> &[BTreeMap<TrackPair, f64>] {&self.scores}

    pub fn total_score(&self) -> f64 {self.total_score}

    pub fn score(&self, subdivision: usize, tracks: TrackPair) -> Option<f64> {
        self.scores.get(subdivision)?.get(&tracks).copied()
    }

    /// Mean over subdivisions, for every track pair that was scored.
    pub fn track_pair_averages(&self) -> BTreeMap<TrackPair, f64> {
        let mut sums = BTreeMap::new();
        for scores in self.scores.iter() {
            for (tracks, score) in scores.iter() {
                *sums.entry(*tracks).or_insert(0.0) += score;
            }
        }
        let count = self.scores.len() as f64;
        sums.values_mut().for_each(|s| *s /= count);
        sums
    }

    pub fn track_pair_average(&self, tracks: TrackPair) -> Option<f64> {
        self.track_pair_averages().get(&tracks).copied()
    }

    /// The `count` highest individual subdivision scores.
    pub fn best_matches(&self, count: usize) -> Vec<ScoreEntry> {
        let mut entries: Vec<ScoreEntry> = self
            .scores
            .iter()
            .enumerate()
            .flat_map(|(subdivision, scores)| {
                scores.iter().map(move |(tracks, score)| ScoreEntry {subdivision, tracks: *tracks, score: *score})
            })
            .collect();
        entries.sort_by_key(|e| Reverse(OrderedFloat(e.score)));
        entries.truncate(count);
        entries
    }

    pub fn best_to_string(&self, count: usize) -> String {
        self.best_matches(count)
            .iter()
            .map(|e| format!("Q{} C{}/C{}: {:.3}", e.subdivision, e.tracks.0, e.tracks.1, e.score))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Pairs tracks across the two songs by average score, highest first,
    /// skipping any pair that reuses a track already taken. Greedy, so a
    /// higher total pairing can be missed.
    pub fn best_instrument_matches(&self, threshold: f64) -> Vec<InstrumentMatch> {
        let mut candidates: Vec<InstrumentMatch> = self
            .track_pair_averages()
            .into_iter()
            .filter(|(_, score)| *score > threshold)
            .map(|(tracks, score)| InstrumentMatch {tracks, score})
            .collect();
        candidates.sort_by_key(|m| Reverse(OrderedFloat(m.score)));

        let mut used_first = BTreeSet::new();
        let mut used_second = BTreeSet::new();
        let mut matches = vec![];
        for candidate in candidates {
            let (i, j) = candidate.tracks;
            if !used_first.contains(&i) && !used_second.contains(&j) {
                used_first.insert(i);
                used_second.insert(j);
                matches.push(candidate);
            }
        }
        matches
    }

    /// `best_instrument_matches` at the configured threshold.
    pub fn matched_instruments(&self, config: &ComparisonConfig) -> Vec<InstrumentMatch> {
        self.best_instrument_matches(config.match_threshold)
    }
}

impl Display for Comparison {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {} : Total {:.3}", self.songs.0, self.songs.1, self.total_score)
    }
}

/// Scores every pair among the first `max_channels` tracks of each song.
/// Songs with different meters or lattices are not comparable: `Ok(None)`.
pub fn compare(a: &Song, b: &Song, config: &ComparisonConfig) -> Result<Option<Comparison>> {
    if a.beats_per_measure() != b.beats_per_measure() {
        debug!("{} / {}: {} vs {} beats per measure, not comparable", a.id(), b.id(), a.beats_per_measure(), b.beats_per_measure());
        return Ok(None);
    }
    if a.intervals() != b.intervals() {
        debug!("{} / {}: analysed on different lattices, not comparable", a.id(), b.id());
        return Ok(None);
    }

    check_track_subdivisions(a.tracks(), a.beats_per_measure())?;
    check_track_subdivisions(b.tracks(), b.beats_per_measure())?;

    let mut scores = vec![BTreeMap::new(); a.beats_per_measure()];
    for (i, track_a) in a.tracks().iter().enumerate().take(config.max_channels) {
        for (j, track_b) in b.tracks().iter().enumerate().take(config.max_channels) {
            let by_subdivision = if config.dist_weighted {
                weighted_overlap_by_subdivision(track_a, track_b, config.pitch_offset, a.intervals())?
            } else {
                unweighted_overlap_by_subdivision(track_a, track_b, config.pitch_offset)?
            };
            for (q, score) in by_subdivision.into_iter().enumerate() {
                scores[q].insert((i, j), score);
            }
        }
    }
    Ok(Some(Comparison::from_scores((a.id(), b.id()), scores)))
}

/// Maps matched track indices back to each song's instrument positions in its `SongInput`.
pub fn source_instrument_pairs(a: &Song, b: &Song, matches: &[InstrumentMatch]) -> Vec<(usize, usize)> {
    matches
        .iter()
        .filter_map(|m| Some((*a.instrument_indices().get(m.tracks.0)?, *b.instrument_indices().get(m.tracks.1)?)))
        .collect()
}
