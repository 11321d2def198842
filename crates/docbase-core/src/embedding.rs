//! Embedding encoder trait and vector utilities.
//!
//! Defines the [`EmbeddingEncoder`] trait that all embedding backends
//! implement, the deterministic [`HashingEncoder`], and pure helpers for
//! validating encoder output and computing distances.
//!
//! Neural encoders (fastembed) live in the `docbase` app crate.

use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EmbedError {
    #[error("embedding backend failed: {0}")]
    Backend(String),
    #[error("encoder returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },
    #[error("encoder returned a {actual}-dimensional vector, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding dimension must be > 0")]
    ZeroDimension,
}

/// Maps text to fixed-dimension vectors.
///
/// Every vector produced by one encoder instance has length [`dims`](Self::dims).
/// Output order matches input order, and encoding a batch must give the
/// same vectors as encoding its members one at a time.
pub trait EmbeddingEncoder: Send + Sync {
    /// Model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;

    /// Embedding dimensionality, fixed at construction.
    fn dims(&self) -> usize;

    /// Embed a batch of texts.
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Embed one text. Equivalent to a length-1 [`encode`](Self::encode).
    fn encode_one(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let vectors = self.encode(&[text.to_string()])?;
        let actual = vectors.len();
        vectors
            .into_iter()
            .next()
            .filter(|_| actual == 1)
            .ok_or(EmbedError::CountMismatch {
                expected: 1,
                actual,
            })
    }
}

/// Check that a batch of encoder output has the expected count and width.
pub fn check_batch(dims: usize, expected: usize, vectors: &[Vec<f32>]) -> Result<(), EmbedError> {
    if vectors.len() != expected {
        return Err(EmbedError::CountMismatch {
            expected,
            actual: vectors.len(),
        });
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
        return Err(EmbedError::DimensionMismatch {
            expected: dims,
            actual: bad.len(),
        });
    }
    Ok(())
}

/// Squared Euclidean distance. Callers guarantee equal lengths.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Scale `v` to unit length in place; zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Deterministic bag-of-words encoder using SHA-256 feature hashing.
///
/// Each lower-cased alphanumeric token adds `1.0` to bucket
/// `sha256(token) mod dims`; the result is L2-normalised. Texts sharing
/// vocabulary land close together under L2 distance, which is enough for
/// offline use and tests. No model download, no global state.
///
/// The empty string maps to the zero vector. Any other string maps to a
/// non-zero vector: when it has no alphanumeric tokens the whole string is
/// hashed as a single token.
#[derive(Debug, Clone)]
pub struct HashingEncoder {
    dims: usize,
    name: String,
}

impl HashingEncoder {
    pub fn new(dims: usize) -> Result<Self, EmbedError> {
        if dims == 0 {
            return Err(EmbedError::ZeroDimension);
        }
        Ok(Self {
            dims,
            name: format!("hashing-{}", dims),
        })
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        if text.is_empty() {
            return v;
        }

        let lowered = text.to_lowercase();
        let mut tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            let trimmed = lowered.trim();
            tokens.push(if trimmed.is_empty() { lowered.as_str() } else { trimmed });
        }

        for token in tokens {
            v[self.bucket(token)] += 1.0;
        }
        l2_normalize(&mut v);
        v
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(head) % self.dims as u64) as usize
    }
}

impl EmbeddingEncoder for HashingEncoder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
