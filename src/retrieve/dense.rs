//! Dense baseline: paragraphs ordered by raw cosine similarity alone.

use crate::embed::dot;
use crate::error::{EmbedError, RetrievalError};

/// A paragraph index with its cosine similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DenseHit {
    pub paragraph: usize,
    pub similarity: f32,
}

/// Top `top_k` paragraphs by dot product with `query`. Equal similarities
/// keep paragraph order.
pub fn dense_search(
    paragraph_embeddings: &[Vec<f32>],
    query: &[f32],
    top_k: usize,
) -> Result<Vec<DenseHit>, RetrievalError> {
    if top_k == 0 {
        return Err(RetrievalError::InvalidTopK);
    }
    let mut hits = Vec::with_capacity(paragraph_embeddings.len());
    for (paragraph, emb) in paragraph_embeddings.iter().enumerate() {
        if emb.len() != query.len() {
            return Err(EmbedError::DimensionMismatch {
                expected: emb.len(),
                actual: query.len(),
            }
            .into());
        }
        hits.push(DenseHit {
            paragraph,
            similarity: dot(emb, query),
        });
    }
    hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    hits.truncate(top_k);
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_similarity_with_stable_ties() {
        let embs = vec![
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![0.6, 0.8],
            vec![1.0, 0.0],
        ];
        let hits = dense_search(&embs, &[1.0, 0.0], 3).unwrap();
        let order: Vec<usize> = hits.iter().map(|h| h.paragraph).collect();
        assert_eq!(order, vec![1, 3, 2]);
    }

    #[test]
    fn rejects_zero_top_k_and_wrong_dimension() {
        let embs = vec![vec![1.0, 0.0]];
        assert!(matches!(
            dense_search(&embs, &[1.0, 0.0], 0),
            Err(RetrievalError::InvalidTopK)
        ));
        assert!(matches!(
            dense_search(&embs, &[1.0, 0.0, 0.0], 1),
            Err(RetrievalError::Embed(EmbedError::DimensionMismatch { .. }))
        ));
    }
}
