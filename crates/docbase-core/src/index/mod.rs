//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the seam between the knowledge base and
//! the nearest-neighbour structure. Rows are numbered `0..count()` in
//! insertion order and never reused; each row pairs one vector with one
//! [`ChunkMetadata`] record that only the index owns.
//!
//! [`FlatIndex`] is the exact, exhaustive implementation and the reference
//! behaviour for ranking: ascending squared L2 distance, ties broken by the
//! lower row index.

pub mod flat;

pub use flat::FlatIndex;

use serde::Serialize;
use std::ops::Range;
use thiserror::Error;

use crate::models::ChunkMetadata;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("vectors and metadata length mismatch: {vectors} vectors, {metadatas} metadata records")]
    LengthMismatch { vectors: usize, metadatas: usize },
    #[error("dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("index dimension must be > 0")]
    ZeroDimension,
    #[error("row {row} out of range (index holds {count} rows)")]
    RowOutOfRange { row: usize, count: usize },
}

/// One ranked hit from [`VectorIndex::search`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    pub row: usize,
    /// Squared L2 distance to the query vector.
    pub distance: f32,
    pub metadata: ChunkMetadata,
}

/// Nearest-neighbour index over fixed-dimension vectors.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add`](VectorIndex::add) | Append a batch of rows, all or nothing |
/// | [`search`](VectorIndex::search) | k nearest rows with distances |
/// | [`query`](VectorIndex::query) | k nearest metadata records |
/// | [`get`](VectorIndex::get) | Metadata for one row |
/// | [`count`](VectorIndex::count) | Number of stored rows |
pub trait VectorIndex: Send + Sync {
    /// Create an empty index for `dims`-dimensional vectors.
    fn with_dims(dims: usize) -> Result<Self, IndexError>
    where
        Self: Sized;

    fn dims(&self) -> usize;

    fn count(&self) -> usize;

    /// Append rows. Rejects the whole batch, leaving the index untouched,
    /// on a length or dimension mismatch. Returns the assigned row range.
    fn add(
        &mut self,
        vectors: Vec<Vec<f32>>,
        metadatas: Vec<ChunkMetadata>,
    ) -> Result<Range<usize>, IndexError>;

    /// Up to `k` nearest rows, closest first. Empty index gives an empty result.
    fn search(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError>;

    /// Like [`search`](Self::search), returning only the metadata.
    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ChunkMetadata>, IndexError> {
        Ok(self
            .search(vector, k)?
            .into_iter()
            .map(|n| n.metadata)
            .collect())
    }

    fn get(&self, row: usize) -> Result<&ChunkMetadata, IndexError>;
}
