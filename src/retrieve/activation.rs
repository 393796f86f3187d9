//! Query activation: from a query vector to a seed set of entities.
//!
//! Step one selects sentences similar to the query (everything above the
//! threshold plus the top `R`, so a strict threshold never leaves the set
//! empty). Step two lights up every entity those sentences mention. Optional
//! extra rounds widen the set through sentences that share an already active
//! entity.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::embed::index::EmbeddingIndex;
use crate::graph::{EntityId, TriGraph};

/// Tunables for [`activate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationParams {
    /// `R`: sentences always taken per round, by similarity.
    pub top_r: usize,
    /// Sentences at or above this cosine similarity are always taken.
    pub similarity_threshold: f32,
    /// Total rounds; `1` means no expansion. `0` behaves like `1`.
    pub rounds: usize,
}

impl Default for ActivationParams {
    fn default() -> Self {
        Self {
            top_r: 100,
            similarity_threshold: 0.25,
            rounds: 1,
        }
    }
}

/// Outcome of one activation. Query-local; never cached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Activation {
    /// Activated entities.
    pub entities: BTreeSet<EntityId>,
    /// Selected sentence indices across all rounds.
    pub sentences: BTreeSet<usize>,
    /// Rounds actually performed.
    pub rounds: usize,
}

impl Activation {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// The `r` highest-similarity candidates, ties broken by lower index.
fn top_r(candidates: impl Iterator<Item = usize>, sims: &[f32], r: usize) -> Vec<usize> {
    let mut ranked: Vec<usize> = candidates.collect();
    ranked.sort_by(|&a, &b| sims[b].total_cmp(&sims[a]).then(a.cmp(&b)));
    ranked.truncate(r);
    ranked
}

/// Run activation for a unit query vector.
///
/// Single-threaded and deterministic: identical inputs give identical sets.
/// A corpus with zero sentences yields an empty activation.
pub fn activate(
    graph: &TriGraph,
    index: &EmbeddingIndex,
    query: &[f32],
    params: &ActivationParams,
) -> Activation {
    let sims = index.similarities(query);
    let n = sims.len();
    let mut out = Activation::default();
    if n == 0 {
        return out;
    }

    out.sentences
        .extend((0..n).filter(|&s| sims[s] >= params.similarity_threshold));
    out.sentences.extend(top_r(0..n, &sims, params.top_r));
    for &s in &out.sentences {
        out.entities.extend(graph.entities_of_sentence(s));
    }
    out.rounds = 1;

    for _ in 1..params.rounds.max(1) {
        if out.entities.is_empty() {
            break;
        }
        let candidates = (0..n).filter(|&s| {
            graph
                .entities_of_sentence(s)
                .any(|e| out.entities.contains(&e))
        });
        let more = top_r(candidates, &sims, params.top_r);
        for s in more {
            out.sentences.insert(s);
            out.entities.extend(graph.entities_of_sentence(s));
        }
        out.rounds += 1;
    }

    tracing::debug!(
        sentences = out.sentences.len(),
        entities = out.entities.len(),
        rounds = out.rounds,
        "activated entities"
    );
    out
}
