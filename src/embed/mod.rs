//! Text embeddings.
//!
//! The [`Embedder`] trait is the seam to an external embedding model. The
//! engine only relies on one property: `encode` returns unit-length vectors of
//! a fixed dimension, so a dot product is a cosine similarity.
//!
//! [`HashingEmbedder`] is a deterministic, model-free implementation (feature
//! hashing of word tokens into seeded random directions). It is what the CLI
//! and the tests use.

pub mod index;

use rand::{Rng, SeedableRng};

use crate::error::EmbedError;

/// Maps text to a unit vector of a fixed dimension.
pub trait Embedder: Send + Sync {
    /// Output dimension. Must be stable for the lifetime of an index.
    fn dimension(&self) -> usize;

    /// Encode `text` into a unit vector (or the zero vector if the text
    /// carries no signal).
    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// Dot product. Callers guarantee equal lengths.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Scale `v` to unit L2 norm in place. Zero vectors stay zero.
pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Lowercased alphanumeric word tokens.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// FNV-1a, used instead of `DefaultHasher` because persisted embeddings must
/// not change between toolchain versions.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

/// Bag-of-words embedder: every token maps to a deterministic random
/// direction (seeded by the token's hash); a text is the normalized sum of its
/// tokens' directions. Shared tokens therefore raise cosine similarity.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self, EmbedError> {
        if dimension == 0 {
            return Err(EmbedError::ZeroDimension);
        }
        Ok(Self { dimension })
    }

    fn token_direction(&self, token: &str, out: &mut [f32]) {
        let mut rng = rand::rngs::StdRng::seed_from_u64(fnv1a(token.as_bytes()));
        for x in out.iter_mut() {
            *x += rng.gen_range(-1.0f32..1.0f32);
        }
    }
}

impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut v = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            self.token_direction(&token, &mut v);
        }
        normalize(&mut v);
        Ok(v)
    }
}

/// Encode and check the result against an expected dimension.
pub fn encode_checked(embedder: &dyn Embedder, text: &str, expected: usize) -> Result<Vec<f32>, EmbedError> {
    let v = embedder.encode(text)?;
    if v.len() != expected {
        return Err(EmbedError::DimensionMismatch {
            expected,
            actual: v.len(),
        });
    }
    Ok(v)
}
