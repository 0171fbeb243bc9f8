use std::collections::VecDeque;

use enum_iterator::Sequence;
use ndarray::{Array1, Array2, Axis};

use crate::error::{Result, TonnetzError};
use crate::lattice::Lattice;
use crate::transitions::TransitionGraph;

const EIGENVECTOR_MAX_ITERATIONS: usize = 100;
const EIGENVECTOR_TOLERANCE: f64 = 1.0e-6;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Sequence, Hash)]
pub enum MatrixKind {
    Adjacency,
    Degree,
    Laplacian,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Sequence, Hash)]
pub enum Centrality {
    Degree,
    Closeness,
    Betweenness,
    Eigenvector,
}

/// Symmetric weighted adjacency over every lattice node, in lattice node
/// order. Both directions of a transition add to the same entry.
pub fn adjacency_matrix(graph: &TransitionGraph, lattice: &Lattice) -> Array2<f64> {
    let n = lattice.len();
    let mut adjacency = Array2::zeros((n, n));
    for ((from, to), weight) in graph.iter() {
        if let (Some(i), Some(j)) = (lattice.node_index(*from), lattice.node_index(*to)) {
            if i != j {
                adjacency[[i, j]] += weight;
                adjacency[[j, i]] += weight;
            }
        }
    }
    adjacency
}

pub fn degree_matrix(adjacency: &Array2<f64>) -> Array2<f64> {
    Array2::from_diag(&adjacency.sum_axis(Axis(1)))
}

pub fn laplacian_matrix(adjacency: &Array2<f64>) -> Array2<f64> {
    degree_matrix(adjacency) - adjacency
}

pub fn matrix(graph: &TransitionGraph, lattice: &Lattice, kind: MatrixKind) -> Array2<f64> {
    let adjacency = adjacency_matrix(graph, lattice);
    match kind {
        MatrixKind::Adjacency => adjacency,
        MatrixKind::Degree => degree_matrix(&adjacency),
        MatrixKind::Laplacian => laplacian_matrix(&adjacency),
    }
}

/// One matrix per subdivision.
pub fn matrices(graphs: &[TransitionGraph], lattice: &Lattice, kind: MatrixKind) -> Vec<Array2<f64>> {
    graphs.iter().map(|g| matrix(g, lattice, kind)).collect()
}

fn neighbor_lists(adjacency: &Array2<f64>) -> Vec<Vec<usize>> {
    adjacency
        .rows()
        .into_iter()
        .map(|row| row.iter().enumerate().filter(|(_, w)| **w != 0.0).map(|(j, _)| j).collect())
        .collect()
}

fn degree_centrality(neighbors: &[Vec<usize>]) -> Array1<f64> {
    let n = neighbors.len();
    if n <= 1 {
        return Array1::ones(n);
    }
    neighbors.iter().map(|ns| ns.len() as f64 / (n - 1) as f64).collect()
}

fn bfs_distances(neighbors: &[Vec<usize>], source: usize) -> Vec<Option<usize>> {
    let mut dist = vec![None; neighbors.len()];
    dist[source] = Some(0);
    let mut queue = VecDeque::from([source]);
    while let Some(v) = queue.pop_front() {
        let d = dist[v].unwrap_or(0);
        for w in neighbors[v].iter() {
            if dist[*w].is_none() {
                dist[*w] = Some(d + 1);
                queue.push_back(*w);
            }
        }
    }
    dist
}

// Scaled by the reachable fraction so disconnected nodes are not inflated.
fn closeness_centrality(neighbors: &[Vec<usize>]) -> Array1<f64> {
    let n = neighbors.len();
    (0..n)
        .map(|u| {
            let reached: Vec<usize> = bfs_distances(neighbors, u).into_iter().flatten().collect();
            let total: usize = reached.iter().sum();
            if total == 0 || n <= 1 {
                0.0
            } else {
                let others = (reached.len() - 1) as f64;
                (others / total as f64) * (others / (n - 1) as f64)
            }
        })
        .collect()
}

// Brandes' accumulation over unweighted shortest paths.
fn betweenness_centrality(neighbors: &[Vec<usize>]) -> Array1<f64> {
    let n = neighbors.len();
    let mut betweenness = Array1::<f64>::zeros(n);
    for source in 0..n {
        let mut stack = vec![];
        let mut predecessors: Vec<Vec<usize>> = vec![vec![]; n];
        let mut paths = vec![0.0; n];
        let mut dist: Vec<Option<usize>> = vec![None; n];
        paths[source] = 1.0;
        dist[source] = Some(0);
        let mut queue = VecDeque::from([source]);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            let dv = dist[v].unwrap_or(0);
            for w in neighbors[v].iter().copied() {
                if dist[w].is_none() {
                    dist[w] = Some(dv + 1);
                    queue.push_back(w);
                }
                if dist[w] == Some(dv + 1) {
                    paths[w] += paths[v];
                    predecessors[w].push(v);
                }
            }
        }
        let mut dependency = vec![0.0; n];
        while let Some(w) = stack.pop() {
            for v in predecessors[w].iter().copied() {
                dependency[v] += paths[v] / paths[w] * (1.0 + dependency[w]);
            }
            if w != source {
                betweenness[w] += dependency[w];
            }
        }
    }
    if n > 2 {
        betweenness /= ((n - 1) * (n - 2)) as f64;
    }
    betweenness
}

// Power iteration on (A + I), normalized each round.
fn eigenvector_centrality(adjacency: &Array2<f64>) -> Result<Array1<f64>> {
    let n = adjacency.nrows();
    if n == 0 {
        return Ok(Array1::zeros(0));
    }
    let mut x = Array1::from_elem(n, 1.0 / n as f64);
    for _ in 0..EIGENVECTOR_MAX_ITERATIONS {
        let last = x.clone();
        x = &last + &adjacency.dot(&last);
        let norm = x.dot(&x).sqrt();
        if norm > 0.0 {
            x /= norm;
        }
        let change: f64 = (&x - &last).mapv(f64::abs).sum();
        if change < n as f64 * EIGENVECTOR_TOLERANCE {
            return Ok(x);
        }
    }
    Err(TonnetzError::CentralityConvergence {iterations: EIGENVECTOR_MAX_ITERATIONS})
}

/// Per-node centrality, in lattice node order. Only eigenvector centrality
/// uses edge weights.
pub fn centrality(graph: &TransitionGraph, lattice: &Lattice, measure: Centrality) -> Result<Array1<f64>> {
    let adjacency = adjacency_matrix(graph, lattice);
    Ok(match measure {
        Centrality::Degree => degree_centrality(&neighbor_lists(&adjacency)),
        Centrality::Closeness => closeness_centrality(&neighbor_lists(&adjacency)),
        Centrality::Betweenness => betweenness_centrality(&neighbor_lists(&adjacency)),
        Centrality::Eigenvector => eigenvector_centrality(&adjacency)?,
    })
}

pub fn centralities(graphs: &[TransitionGraph], lattice: &Lattice, measure: Centrality) -> Result<Vec<Array1<f64>>> {
    graphs.iter().map(|g| centrality(g, lattice, measure)).collect()
}
