//! Per-sentence embedding cache for one corpus.
//!
//! Sentence vectors are computed once at build time (in parallel) and stored
//! flat. Paragraph vectors are derived on demand as the renormalized mean of
//! the paragraph's own sentence vectors.

use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{EmbedError, RetrievalError, TriGraphResult};
use crate::graph::TriGraph;
use crate::graph::persist::{io_error, serde_error};

use super::{Embedder, encode_checked, normalize};

pub const EMBEDDING_FILE: &str = "index_sent_emb.bin";

/// Unit-vector embedding per sentence, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingIndex {
    dimension: usize,
    vectors: Vec<f32>,
}

impl EmbeddingIndex {
    /// Embed every sentence of `graph`.
    pub fn build(graph: &TriGraph, embedder: &dyn Embedder) -> Result<Self, EmbedError> {
        let dimension = embedder.dimension();
        if dimension == 0 {
            return Err(EmbedError::ZeroDimension);
        }
        let rows: Vec<Vec<f32>> = graph
            .sentences()
            .par_iter()
            .map(|s| encode_checked(embedder, &s.text, dimension))
            .collect::<Result<_, _>>()?;

        let vectors = rows.into_iter().flatten().collect();
        tracing::info!(
            sentences = graph.sentences().len(),
            dimension,
            "built sentence embedding index"
        );
        Ok(Self { dimension, vectors })
    }

    /// Build from precomputed rows. Every row must have length `dimension`.
    pub fn from_rows(dimension: usize, rows: Vec<Vec<f32>>) -> Result<Self, EmbedError> {
        if dimension == 0 {
            return Err(EmbedError::ZeroDimension);
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != dimension) {
            return Err(EmbedError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }
        Ok(Self {
            dimension,
            vectors: rows.into_iter().flatten().collect(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of sentence vectors.
    pub fn len(&self) -> usize {
        self.vectors.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Vector of sentence `s`.
    pub fn sentence(&self, s: usize) -> &[f32] {
        &self.vectors[s * self.dimension..(s + 1) * self.dimension]
    }

    /// Dot product of `query` with every sentence vector.
    pub fn similarities(&self, query: &[f32]) -> Vec<f32> {
        self.vectors
            .chunks_exact(self.dimension)
            .map(|row| super::dot(row, query))
            .collect()
    }

    /// Aggregate vector per paragraph: mean of its sentences, renormalized.
    /// A paragraph without sentences gets the zero vector.
    pub fn paragraph_embeddings(&self, graph: &TriGraph) -> Vec<Vec<f32>> {
        (0..graph.paragraphs().len())
            .map(|p| {
                let mut v = vec![0.0f32; self.dimension];
                let sids = graph.sentences_of(p);
                for &s in sids {
                    for (acc, x) in v.iter_mut().zip(self.sentence(s)) {
                        *acc += x;
                    }
                }
                if !sids.is_empty() {
                    let n = sids.len() as f32;
                    v.iter_mut().for_each(|x| *x /= n);
                }
                normalize(&mut v);
                v
            })
            .collect()
    }

    /// Fail with [`RetrievalError::DimensionMismatch`] unless this index has
    /// exactly one vector per sentence of `graph`.
    pub fn check_against(&self, graph: &TriGraph) -> Result<(), RetrievalError> {
        let corpus = graph.sentences().len();
        if self.len() != corpus || self.vectors.len() % self.dimension != 0 {
            return Err(RetrievalError::DimensionMismatch {
                what: "sentence embedding",
                index: self.len(),
                corpus,
            });
        }
        Ok(())
    }

    pub fn save(&self, dir: &Path) -> TriGraphResult<()> {
        std::fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
        let path = dir.join(EMBEDDING_FILE);
        let bytes = bincode::serialize(self).map_err(|e| serde_error(&path, e))?;
        std::fs::write(&path, bytes).map_err(|e| io_error(&path, e))?;
        Ok(())
    }

    pub fn load(dir: &Path) -> TriGraphResult<Self> {
        let path = dir.join(EMBEDDING_FILE);
        if !path.is_file() {
            return Err(RetrievalError::MissingIndex {
                path: path.display().to_string(),
            }
            .into());
        }
        let bytes = std::fs::read(&path).map_err(|e| io_error(&path, e))?;
        let index: Self = bincode::deserialize(&bytes).map_err(|e| serde_error(&path, e))?;
        if index.dimension == 0 {
            return Err(EmbedError::ZeroDimension.into());
        }
        Ok(index)
    }
}
