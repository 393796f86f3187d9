//! Personalized PageRank over the entity co-occurrence graph.
//!
//! `W = MᵗM + CᵗC` counts how often two entities share a sentence plus how
//! often they share a paragraph. The diagonal is dropped, `W` is row-normalized
//! into the transition matrix `P`, and the walk restarts into the teleport
//! vector `v` with probability `damping` at every step:
//!
//! ```text
//! r₀ = v
//! r  ← (1 − damping)·P·r + damping·v
//! ```
//!
//! Each step replaces an entity's score with the weighted average of its
//! neighbours' scores. `P·r` does not conserve mass and isolated entities
//! have zero rows, so the final vector is renormalized to sum to one. Larger
//! `damping` keeps the mass closer to the seeds.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::graph::EntityId;
use crate::graph::sparse::CsrMatrix;

/// Tunables for [`propagate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationParams {
    /// Restart probability in `(0, 1]`.
    pub damping: f64,
    pub max_iters: usize,
    /// L1 change between iterates below which the walk stops.
    pub tolerance: f64,
}

impl Default for PropagationParams {
    fn default() -> Self {
        Self {
            damping: 0.15,
            max_iters: 50,
            tolerance: 1e-6,
        }
    }
}

/// Query-local propagation result.
#[derive(Debug, Clone, PartialEq)]
pub struct Propagation {
    /// Probability mass per entity; sums to one unless empty.
    pub scores: Vec<f64>,
    pub iterations: usize,
    /// `false` when `max_iters` was hit first; `scores` is then the last
    /// iterate, still normalized.
    pub converged: bool,
}

/// `W = MᵗM + CᵗC` with the diagonal and explicit zeros removed.
pub fn cooccurrence_matrix(m: &CsrMatrix, c: &CsrMatrix) -> Result<CsrMatrix, GraphError> {
    if m.shape().1 != c.shape().1 {
        return Err(GraphError::ShapeMismatch {
            matrix: "C",
            expected: (c.shape().0, m.shape().1),
            actual: c.shape(),
        });
    }
    Ok(m.gram().add(&c.gram())?.without_diagonal())
}

/// The co-occurrence graph and its transition matrix, computed once per
/// loaded graph and shared by every query.
#[derive(Debug, Clone)]
pub struct CooccurrenceGraph {
    weights: CsrMatrix,
    transition: CsrMatrix,
    degrees: Vec<f64>,
}

impl CooccurrenceGraph {
    pub fn new(m: &CsrMatrix, c: &CsrMatrix) -> Result<Self, GraphError> {
        let weights = cooccurrence_matrix(m, c)?;
        let transition = weights.row_normalized();
        let degrees = weights.row_sums();
        Ok(Self {
            weights,
            transition,
            degrees,
        })
    }

    pub fn entity_count(&self) -> usize {
        self.degrees.len()
    }

    /// Symmetric weight matrix `W`.
    pub fn weights(&self) -> &CsrMatrix {
        &self.weights
    }

    /// Weighted degree of every entity.
    pub fn degrees(&self) -> &[f64] {
        &self.degrees
    }

    /// Restart distribution: uniform over in-range seeds; without seeds,
    /// proportional to degree; with zero total degree, uniform.
    pub fn teleport(&self, seeds: &BTreeSet<EntityId>) -> Vec<f64> {
        let n = self.entity_count();
        let mut v = vec![0.0f64; n];
        if n == 0 {
            return v;
        }

        let in_range: Vec<usize> = seeds.iter().map(|e| e.index()).filter(|&i| i < n).collect();
        if !in_range.is_empty() {
            let mass = 1.0 / in_range.len() as f64;
            for i in in_range {
                v[i] = mass;
            }
            return v;
        }

        let total: f64 = self.degrees.iter().sum();
        if total > 0.0 {
            for (vi, d) in v.iter_mut().zip(&self.degrees) {
                *vi = d / total;
            }
        } else {
            v.fill(1.0 / n as f64);
        }
        v
    }

    /// Run personalized PageRank from `seeds`.
    pub fn propagate(&self, seeds: &BTreeSet<EntityId>, params: &PropagationParams) -> Propagation {
        let n = self.entity_count();
        if n == 0 {
            return Propagation {
                scores: Vec::new(),
                iterations: 0,
                converged: true,
            };
        }
        if seeds.is_empty() {
            tracing::debug!("empty activation; using degree-proportional teleport");
        }

        let v = self.teleport(seeds);
        let keep = 1.0 - params.damping;
        let mut r = v.clone();
        let mut iterations = 0usize;
        let mut converged = false;

        while iterations < params.max_iters {
            let walked = self.transition.mul_vec(&r);
            let next: Vec<f64> = walked
                .iter()
                .zip(&v)
                .map(|(w, t)| keep * w + params.damping * t)
                .collect();
            let delta: f64 = next.iter().zip(&r).map(|(a, b)| (a - b).abs()).sum();
            r = next;
            iterations += 1;
            if delta < params.tolerance {
                converged = true;
                break;
            }
        }

        if !converged {
            tracing::debug!(iterations, "propagation hit max_iters before tolerance");
        }

        let sum: f64 = r.iter().sum();
        if sum > 0.0 {
            r.iter_mut().for_each(|x| *x /= sum);
        }
        Propagation {
            scores: r,
            iterations,
            converged,
        }
    }
}

/// One-shot personalized PageRank: builds the co-occurrence graph from `M`
/// and `C` and propagates from `seeds`.
pub fn propagate(
    m: &CsrMatrix,
    c: &CsrMatrix,
    seeds: &BTreeSet<EntityId>,
    params: &PropagationParams,
) -> Result<Propagation, GraphError> {
    Ok(CooccurrenceGraph::new(m, c)?.propagate(seeds, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds(v: &[usize]) -> BTreeSet<EntityId> {
        v.iter().map(|&i| EntityId(i)).collect()
    }

    /// A co-occurs with B (sentence 0) and with C (sentence 1); B and C never
    /// meet. `C` is empty so `W = [[0,1,1],[1,0,0],[1,0,0]]`.
    fn star() -> (CsrMatrix, CsrMatrix) {
        let m = CsrMatrix::from_pairs(2, 3, &[(0, 0), (0, 1), (1, 0), (1, 2)]);
        let c = CsrMatrix::zeros(0, 3);
        (m, c)
    }

    fn assert_distribution(scores: &[f64]) {
        assert!(scores.iter().all(|&x| x >= 0.0));
        assert!((scores.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cooccurrence_sums_sentence_and_paragraph_counts() {
        let m = CsrMatrix::from_pairs(1, 2, &[(0, 0), (0, 1)]);
        let c = CsrMatrix::from_pairs(1, 2, &[(0, 0), (0, 1)]);
        let w = cooccurrence_matrix(&m, &c).unwrap();
        assert_eq!(w.get(0, 1), 2.0);
        assert_eq!(w.get(0, 0), 0.0);
    }

    #[test]
    fn column_spaces_must_agree() {
        let m = CsrMatrix::zeros(1, 2);
        let c = CsrMatrix::zeros(1, 3);
        assert!(cooccurrence_matrix(&m, &c).is_err());
    }

    #[test]
    fn star_graph_weights() {
        let (m, c) = star();
        let g = CooccurrenceGraph::new(&m, &c).unwrap();
        assert_eq!(g.weights().get(0, 1), 1.0);
        assert_eq!(g.weights().get(0, 2), 1.0);
        assert_eq!(g.weights().get(1, 2), 0.0);
        assert_eq!(g.degrees(), &[2.0, 1.0, 1.0]);
    }

    #[test]
    fn empty_seeds_use_degree_teleport_and_favor_the_hub() {
        let (m, c) = star();
        let g = CooccurrenceGraph::new(&m, &c).unwrap();
        assert_eq!(g.teleport(&seeds(&[])), vec![0.5, 0.25, 0.25]);

        let p = g.propagate(&seeds(&[]), &PropagationParams::default());
        assert_distribution(&p.scores);
        assert!(p.scores[0] > p.scores[1]);
        assert!(p.scores[0] > p.scores[2]);
        assert!((p.scores[1] - p.scores[2]).abs() < 1e-12);
    }

    #[test]
    fn seeded_walk_concentrates_near_seed() {
        let (m, c) = star();
        let p = propagate(&m, &c, &seeds(&[1]), &PropagationParams::default()).unwrap();
        assert_distribution(&p.scores);
        assert!(p.scores[1] > p.scores[2]);
    }

    #[test]
    fn larger_damping_tightens_locality() {
        let (m, c) = star();
        let loose = PropagationParams {
            damping: 0.1,
            ..Default::default()
        };
        let tight = PropagationParams {
            damping: 0.9,
            ..Default::default()
        };
        let a = propagate(&m, &c, &seeds(&[1]), &loose).unwrap();
        let b = propagate(&m, &c, &seeds(&[1]), &tight).unwrap();
        assert!(b.scores[1] > a.scores[1]);
    }

    #[test]
    fn zero_degree_graph_is_uniform() {
        let m = CsrMatrix::from_pairs(3, 3, &[(0, 0), (1, 1), (2, 2)]);
        let c = CsrMatrix::zeros(0, 3);
        let p = propagate(&m, &c, &seeds(&[]), &PropagationParams::default()).unwrap();
        assert_distribution(&p.scores);
        for &x in &p.scores {
            assert!((x - 1.0 / 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn empty_entity_space_is_empty_vector() {
        let m = CsrMatrix::zeros(2, 0);
        let c = CsrMatrix::zeros(1, 0);
        let p = propagate(&m, &c, &seeds(&[]), &PropagationParams::default()).unwrap();
        assert!(p.scores.is_empty());
    }

    #[test]
    fn non_convergence_returns_best_effort() {
        let (m, c) = star();
        let params = PropagationParams {
            damping: 0.15,
            max_iters: 1,
            tolerance: 1e-12,
        };
        let p = propagate(&m, &c, &seeds(&[1]), &params).unwrap();
        assert!(!p.converged);
        assert_eq!(p.iterations, 1);
        assert_distribution(&p.scores);
    }

    /// Dense reference: iterate `r ← (1−d)·P·r + d·v` on a symmetric edge
    /// list with unit weights, then normalize.
    fn reference(
        n: usize,
        edges: &[(usize, usize)],
        v: &[f64],
        params: &PropagationParams,
    ) -> Vec<f64> {
        let mut w = vec![vec![0.0f64; n]; n];
        for &(a, b) in edges {
            w[a][b] += 1.0;
            w[b][a] += 1.0;
        }
        for row in &mut w {
            let sum: f64 = row.iter().sum();
            if sum > 0.0 {
                row.iter_mut().for_each(|x| *x /= sum);
            }
        }
        let mut r = v.to_vec();
        for _ in 0..params.max_iters {
            let next: Vec<f64> = (0..n)
                .map(|i| {
                    let pr: f64 = (0..n).map(|j| w[i][j] * r[j]).sum();
                    (1.0 - params.damping) * pr + params.damping * v[i]
                })
                .collect();
            let delta: f64 = next.iter().zip(&r).map(|(a, b)| (a - b).abs()).sum();
            r = next;
            if delta < params.tolerance {
                break;
            }
        }
        let sum: f64 = r.iter().sum();
        r.iter().map(|x| x / sum).collect()
    }

    #[test]
    fn matches_neighbour_averaging_reference() {
        // Seed S(0) touches hub H(1) and pendant T(2); H has four leaves.
        let edges = [(0, 1), (0, 2), (1, 3), (1, 4), (1, 5), (1, 6)];
        let pairs: Vec<(usize, usize)> = edges
            .iter()
            .enumerate()
            .flat_map(|(s, &(a, b))| [(s, a), (s, b)])
            .collect();
        let m = CsrMatrix::from_pairs(edges.len(), 7, &pairs);
        let c = CsrMatrix::zeros(0, 7);
        let params = PropagationParams::default();
        let p = propagate(&m, &c, &seeds(&[0]), &params).unwrap();

        let mut v = vec![0.0; 7];
        v[0] = 1.0;
        let expected = reference(7, &edges, &v, &params);
        for (got, want) in p.scores.iter().zip(&expected) {
            assert!((got - want).abs() < 1e-12, "{got} vs {want}");
        }
        // The pendant next to the seed outranks the well-connected hub.
        assert!(p.scores[2] > p.scores[1]);
    }

    #[test]
    fn out_of_range_seeds_are_ignored() {
        let (m, c) = star();
        let g = CooccurrenceGraph::new(&m, &c).unwrap();
        assert_eq!(g.teleport(&seeds(&[2, 99])), vec![0.0, 0.0, 1.0]);
    }
}
