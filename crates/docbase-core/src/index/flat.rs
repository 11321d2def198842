//! Exact flat index: vectors stored row-major, exhaustive O(n·d) search.

use std::cmp::Ordering;
use std::ops::Range;

use super::{IndexError, Neighbor, VectorIndex};
use crate::embedding::squared_l2;
use crate::models::ChunkMetadata;

/// Brute-force squared-L2 index.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dims: usize,
    data: Vec<f32>,
    metadata: Vec<ChunkMetadata>,
}

impl FlatIndex {
    pub fn new(dims: usize) -> Result<Self, IndexError> {
        if dims == 0 {
            return Err(IndexError::ZeroDimension);
        }
        Ok(Self {
            dims,
            data: Vec::new(),
            metadata: Vec::new(),
        })
    }

    fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.dims..(row + 1) * self.dims]
    }

    fn check_dims(&self, v: &[f32]) -> Result<(), IndexError> {
        if v.len() != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                actual: v.len(),
            });
        }
        Ok(())
    }
}

impl VectorIndex for FlatIndex {
    fn with_dims(dims: usize) -> Result<Self, IndexError> {
        Self::new(dims)
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn count(&self) -> usize {
        self.metadata.len()
    }

    fn add(
        &mut self,
        vectors: Vec<Vec<f32>>,
        metadatas: Vec<ChunkMetadata>,
    ) -> Result<Range<usize>, IndexError> {
        if vectors.len() != metadatas.len() {
            return Err(IndexError::LengthMismatch {
                vectors: vectors.len(),
                metadatas: metadatas.len(),
            });
        }
        for v in &vectors {
            self.check_dims(v)?;
        }

        let first = self.count();
        self.data.reserve(vectors.len() * self.dims);
        for v in vectors {
            self.data.extend_from_slice(&v);
        }
        self.metadata.extend(metadatas);
        Ok(first..self.count())
    }

    fn search(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        self.check_dims(vector)?;
        if k == 0 || self.metadata.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, usize)> = (0..self.count())
            .map(|row| (squared_l2(vector, self.row(row)), row))
            .collect();
        scored.sort_by(|a, b| match a.0.total_cmp(&b.0) {
            Ordering::Equal => a.1.cmp(&b.1),
            other => other,
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(distance, row)| Neighbor {
                row,
                distance,
                metadata: self.metadata[row].clone(),
            })
            .collect())
    }

    fn get(&self, row: usize) -> Result<&ChunkMetadata, IndexError> {
        self.metadata.get(row).ok_or(IndexError::RowOutOfRange {
            row,
            count: self.count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(i: usize) -> ChunkMetadata {
        ChunkMetadata {
            source: format!("doc{}.md", i),
            sequence_index: i,
            char_start: i * 10,
            char_end: i * 10 + 10,
            preview_text: format!("chunk {}", i),
        }
    }

    fn index_with(vectors: &[[f32; 2]]) -> FlatIndex {
        let mut idx = FlatIndex::new(2).unwrap();
        let metas = (0..vectors.len()).map(meta).collect();
        idx.add(vectors.iter().map(|v| v.to_vec()).collect(), metas)
            .unwrap();
        idx
    }

    #[test]
    fn test_zero_dims_rejected() {
        assert_eq!(FlatIndex::new(0).unwrap_err(), IndexError::ZeroDimension);
    }

    #[test]
    fn test_empty_index_query_is_empty() {
        let idx = FlatIndex::new(3).unwrap();
        assert_eq!(idx.count(), 0);
        assert!(idx.query(&[0.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_add_assigns_sequential_rows() {
        let mut idx = FlatIndex::new(2).unwrap();
        let r1 = idx
            .add(vec![vec![0.0, 0.0], vec![1.0, 1.0]], vec![meta(0), meta(1)])
            .unwrap();
        let r2 = idx.add(vec![vec![2.0, 2.0]], vec![meta(2)]).unwrap();
        assert_eq!(r1, 0..2);
        assert_eq!(r2, 2..3);
        assert_eq!(idx.count(), 3);
        assert_eq!(idx.get(2).unwrap(), &meta(2));
    }

    #[test]
    fn test_length_mismatch_leaves_index_unchanged() {
        let mut idx = index_with(&[[0.0, 0.0]]);
        let err = idx
            .add(vec![vec![1.0, 1.0], vec![2.0, 2.0]], vec![meta(1)])
            .unwrap_err();
        assert_eq!(
            err,
            IndexError::LengthMismatch {
                vectors: 2,
                metadatas: 1
            }
        );
        assert_eq!(idx.count(), 1);
    }

    #[test]
    fn test_dimension_mismatch_rejects_whole_batch() {
        let mut idx = index_with(&[[0.0, 0.0]]);
        let err = idx
            .add(vec![vec![1.0, 1.0], vec![2.0, 2.0, 2.0]], vec![meta(1), meta(2)])
            .unwrap_err();
        assert_eq!(
            err,
            IndexError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
        assert_eq!(idx.count(), 1);
        assert!(matches!(
            idx.query(&[1.0], 1),
            Err(IndexError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_ranked_by_squared_l2() {
        let idx = index_with(&[[5.0, 5.0], [1.0, 0.0], [0.0, 3.0], [0.5, 0.5]]);
        let hits = idx.search(&[0.0, 0.0], 3).unwrap();
        let rows: Vec<usize> = hits.iter().map(|h| h.row).collect();
        assert_eq!(rows, vec![3, 1, 2]);
        assert_eq!(hits[0].distance, 0.5);
        assert_eq!(hits[1].distance, 1.0);
        assert_eq!(hits[2].distance, 9.0);
    }

    #[test]
    fn test_ties_broken_by_insertion_order() {
        let idx = index_with(&[[1.0, 0.0], [0.0, 1.0], [-1.0, 0.0], [0.0, 0.0]]);
        let metas = idx.query(&[0.0, 0.0], 4).unwrap();
        let sources: Vec<&str> = metas.iter().map(|m| m.source.as_str()).collect();
        assert_eq!(sources, vec!["doc3.md", "doc0.md", "doc1.md", "doc2.md"]);
    }

    #[test]
    fn test_k_larger_than_count_returns_all() {
        let idx = index_with(&[[3.0, 0.0], [1.0, 0.0]]);
        let hits = idx.search(&[0.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].row, 1);
        assert!(idx.query(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_matches_brute_force_reference() {
        let points: Vec<[f32; 2]> = (0..40)
            .map(|i| {
                let x = ((i * 37) % 11) as f32 - 5.0;
                let y = ((i * 17) % 7) as f32 - 3.0;
                [x, y]
            })
            .collect();
        let idx = index_with(&points);
        let q = [0.25f32, -0.75];

        let mut expected: Vec<(f32, usize)> = points
            .iter()
            .enumerate()
            .map(|(i, p)| (squared_l2(&q, p), i))
            .collect();
        expected.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap().then(a.1.cmp(&b.1)));

        let got: Vec<usize> = idx.search(&q, 7).unwrap().iter().map(|h| h.row).collect();
        let want: Vec<usize> = expected.iter().take(7).map(|e| e.1).collect();
        assert_eq!(got, want);
    }

    #[test]
    fn test_get_out_of_range() {
        let idx = index_with(&[[0.0, 0.0]]);
        assert_eq!(
            idx.get(5).unwrap_err(),
            IndexError::RowOutOfRange { row: 5, count: 1 }
        );
    }
}
