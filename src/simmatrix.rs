use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::ops::Range;

use float_cmp::approx_eq;
use log::info;
use ndarray::Array2;
use ordered_float::OrderedFloat;

use crate::comparison::{compare, Comparison};
use crate::config::ComparisonConfig;
use crate::error::{Result, TonnetzError};
use crate::song::Song;

pub type Cell = ((usize, usize), Comparison);

/// Song-by-song total scores for a corpus. Only the upper triangle is
/// computed; each score is mirrored. Incomparable pairs stay at zero.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    ids: Vec<String>,
    scores: Array2<f64>,
    comparisons: BTreeMap<(usize, usize), Comparison>,
}

impl SimilarityMatrix {
    fn from_cells(ids: Vec<String>, cells: Vec<Cell>) -> Self {
        let n = ids.len();
        let mut scores = Array2::zeros((n, n));
        let mut comparisons = BTreeMap::new();
        for ((i, j), comparison) in cells {
            scores[[i, j]] = comparison.total_score();
            scores[[j, i]] = comparison.total_score();
            comparisons.insert((i, j), comparison);
        }
        SimilarityMatrix {ids, scores, comparisons}
    }

    pub fn ids(&self) -> &[String] {&self.ids}

    pub fn scores(&self) -> &Array2<f64> {&self.scores}

    pub fn len(&self) -> usize {self.ids.len()}

    pub fn is_empty(&self) -> bool {self.ids.is_empty()}

    pub fn comparison(&self, i: usize, j: usize) -> Option<&Comparison> {
        self.comparisons.get(&(i.min(j), i.max(j)))
    }

    pub fn is_symmetric(&self) -> bool {
        let n = self.len();
        (0..n).all(|i| (0..i).all(|j| approx_eq!(f64, self.scores[[i, j]], self.scores[[j, i]], ulps = 2)))
    }

    /// Other songs ranked by score against song `i`, highest first.
    pub fn most_similar(&self, i: usize, count: usize) -> Vec<(usize, f64)> {
        if i >= self.len() {
            return vec![];
        }
        let mut ranked: Vec<(usize, f64)> = (0..self.len())
            .filter(|j| *j != i && self.comparison(i, *j).is_some())
            .map(|j| (j, self.scores[[i, j]]))
            .collect();
        ranked.sort_by_key(|(_, score)| Reverse(OrderedFloat(*score)));
        ranked.truncate(count);
        ranked
    }
}

fn check_rows(rows: &Range<usize>, len: usize) -> Result<()> {
    if rows.start > rows.end || rows.end > len {
        Err(TonnetzError::InvalidRowRange {from: rows.start, to: rows.end, len})
    } else {
        Ok(())
    }
}

/// Comparisons of each song in `rows` against itself and every later song.
pub fn similarity_rows(songs: &[Song], config: &ComparisonConfig, rows: Range<usize>) -> Result<Vec<Cell>> {
    check_rows(&rows, songs.len())?;
    let mut cells = vec![];
    for i in rows {
        for j in i..songs.len() {
            if let Some(comparison) = compare(&songs[i], &songs[j], config)? {
                cells.push(((i, j), comparison));
            }
        }
    }
    Ok(cells)
}

pub fn similarity_matrix(songs: &[Song], config: &ComparisonConfig) -> Result<SimilarityMatrix> {
    let cells = similarity_rows(songs, config, 0..songs.len())?;
    Ok(SimilarityMatrix::from_cells(songs.iter().map(|s| s.id()).collect(), cells))
}

/// Splits the rows into contiguous blocks, one per worker thread. Workers
/// share only the read-only song list; cells are merged after all join.
pub fn parallel_similarity_matrix(songs: &[Song], config: &ComparisonConfig, workers: usize) -> Result<SimilarityMatrix> {
    let n = songs.len();
    let block = ((n + workers.max(1) - 1) / workers.max(1)).max(1);
    let blocks: Vec<Range<usize>> = (0..n).step_by(block).map(|start| start..(start + block).min(n)).collect();
    info!("comparing {n} songs in {} blocks of up to {block} rows", blocks.len());

    let results: Vec<Result<Vec<Cell>>> = crossbeam_utils::thread::scope(|s| {
        let handles: Vec<_> = blocks
            .iter()
            .map(|rows| {
                let rows = rows.clone();
                s.spawn(move |_| {
                    let cells = similarity_rows(songs, config, rows.clone());
                    info!("finished rows {rows:?}");
                    cells
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    })
    .unwrap_or_else(|e| std::panic::resume_unwind(e));

    let mut cells = vec![];
    for result in results {
        cells.append(&mut result?);
    }
    Ok(SimilarityMatrix::from_cells(songs.iter().map(|s| s.id()).collect(), cells))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TonnetzConfig;
    use crate::lattice::Lattice;
    use crate::notes::MidiByte;
    use crate::song::tests::instrument;
    use crate::song::SongInput;

    fn song(name: &str, beats_per_measure: usize, parts: &[&[MidiByte]]) -> Song {
        let input = SongInput {
            artist: "Corpus".to_string(),
            name: name.to_string(),
            ticks_per_beat: 480,
            beats_per_measure,
            instruments: parts.iter().map(|p| instrument(0, p)).collect(),
        };
        Song::analyze(&input, &Lattice::shared(&TonnetzConfig::default()).unwrap()).unwrap()
    }

    fn corpus() -> Vec<Song> {
        let _ = env_logger::builder().is_test(true).try_init();
        vec![
            song("a", 4, &[&[60, 64, 67, 64, 60, 62, 65, 69, 67, 65, 64, 62], &[48, 43, 45, 41, 48, 43, 45, 41, 48]]),
            song("b", 4, &[&[72, 71, 69, 67, 65, 64, 62, 60], &[60, 64, 67, 64, 60, 62, 65, 69]]),
            song("c", 3, &[&[67, 69, 71, 72, 74, 72, 71, 69]]),
            song("d", 4, &[&[67, 69, 71, 72, 74, 72, 71, 69], &[60, 62, 64, 65, 67, 69, 71, 72]]),
        ]
    }

    #[test]
    fn test_matrix() {
        let songs = corpus();
        let matrix = similarity_matrix(&songs, &ComparisonConfig::default()).unwrap();
        assert_eq!(matrix.len(), 4);
        assert_eq!(matrix.ids()[2], "Corpus-c");
        assert!(matrix.is_symmetric());
        for i in 0..4 {
            assert!(matrix.scores()[[i, i]] > 0.0);
        }
        assert!(matrix.comparison(0, 2).is_none());
        assert_eq!(matrix.scores()[[0, 2]], 0.0);
        assert_eq!(matrix.scores()[[2, 3]], 0.0);
        assert!(matrix.comparison(1, 0).is_some());
        assert!(matrix.scores()[[0, 1]] > 0.0);

        let ranked = matrix.most_similar(0, 5);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|(j, _)| *j != 0 && *j != 2));
        assert!(ranked[0].1 >= ranked[1].1);
    }

    #[test]
    fn test_row_partitions_cover_matrix() {
        let songs = corpus();
        let config = ComparisonConfig::default();
        let whole = similarity_rows(&songs, &config, 0..4).unwrap();
        let mut parts = similarity_rows(&songs, &config, 0..1).unwrap();
        parts.append(&mut similarity_rows(&songs, &config, 1..4).unwrap());
        assert_eq!(whole, parts);
        assert!(similarity_rows(&songs, &config, 2..2).unwrap().is_empty());
        assert_eq!(similarity_rows(&songs, &config, 1..5), Err(TonnetzError::InvalidRowRange {from: 1, to: 5, len: 4}));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let songs = corpus();
        let config = ComparisonConfig::default();
        let sequential = similarity_matrix(&songs, &config).unwrap();
        for workers in [1, 2, 3, 8] {
            assert_eq!(parallel_similarity_matrix(&songs, &config, workers).unwrap(), sequential);
        }
        assert!(parallel_similarity_matrix(&[], &config, 4).unwrap().is_empty());
    }
}
