// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Exact inner-product index with explicit external ids.
//!
//! A flat scan over row-major vector storage. Exact rather than
//! approximate: per-session corpora are small (hundreds to low
//! thousands of chunks), and id stability across restarts matters more
//! than sub-linear search. Scores are inner products, which are cosine
//! similarities when both sides are unit-normalized. Normalization is
//! the caller's responsibility.

use serde::{Deserialize, Serialize};

use crate::rag::errors::RagError;

/// Sentinel id meaning "no match"; never assigned to a stored vector.
pub const NO_MATCH_ID: i64 = -1;

/// Flat inner-product index over fixed-dimension vectors.
///
/// Vectors are inserted with explicit ids so that ids stay stable
/// across process restarts and are safe to use as metadata keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIpIndex {
    dimension: usize,
    ids: Vec<i64>,
    /// Row-major storage, `ids.len() * dimension` entries.
    vectors: Vec<f32>,
}

impl FlatIpIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ids: Vec::new(),
            vectors: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Highest id currently stored, if any.
    pub fn max_id(&self) -> Option<i64> {
        self.ids.iter().copied().max()
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    /// Insert a vector under an explicit id.
    ///
    /// Rejects negative ids (reserved for the no-match sentinel) and
    /// vectors of the wrong dimension. Duplicate ids are not checked at
    /// this layer; id assignment is the store's job.
    pub fn add_with_id(&mut self, id: i64, vector: &[f32]) -> Result<(), RagError> {
        if id < 0 {
            return Err(RagError::Validation(format!(
                "vector id must be non-negative, got {}",
                id
            )));
        }
        if vector.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        self.ids.push(id);
        self.vectors.extend_from_slice(vector);
        Ok(())
    }

    /// Score every stored vector against `query` and return the top
    /// `k` as `(score, id)` pairs, descending by inner product.
    ///
    /// `k` is clamped to the element count. No tie-break beyond the
    /// descending score order is applied.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(f32, i64)>, RagError> {
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if self.ids.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let k = k.min(self.ids.len());
        let mut scored: Vec<(f32, i64)> = self
            .ids
            .iter()
            .enumerate()
            .map(|(row, &id)| (dot(self.row(row), query), id))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored)
    }

    fn row(&self, row: usize) -> &[f32] {
        let start = row * self.dimension;
        &self.vectors[start..start + self.dimension]
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
