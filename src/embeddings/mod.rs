// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Embedding value type and the seam to the external encoder.
//!
//! The core never runs model inference itself; it consumes fixed-length
//! float vectors through [`EmbeddingProvider`] and normalizes them
//! unconditionally, so providers may hand back normalized or raw output.

use crate::rag::errors::RagError;

/// A fixed-length embedding vector.
///
/// Every vector entering the store travels as an `Embedding`: providers
/// return one from [`EmbeddingProvider::embed_text`], and upsert items
/// carry one per chunk. The dimension is the data length.
#[derive(Debug, Clone)]
pub struct Embedding {
    data: Vec<f32>,
}

impl Embedding {
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    pub fn magnitude(&self) -> f32 {
        self.data.iter().map(|x| x * x).sum::<f32>().sqrt()
    }
}

/// L2-normalize a vector to unit length.
///
/// Inner-product scores are only valid cosine similarities when both
/// sides are unit length. Zero or non-finite-magnitude vectors are
/// returned unchanged.
pub fn normalize_vector(vector: &[f32]) -> Vec<f32> {
    let magnitude: f32 = vector.iter().map(|&x| x * x).sum::<f32>().sqrt();

    if magnitude == 0.0 || !magnitude.is_finite() {
        return vector.to_vec();
    }

    vector.iter().map(|&x| x / magnitude).collect()
}

/// In-place variant of [`normalize_vector`].
pub fn normalize_in_place(vector: &mut [f32]) {
    let magnitude: f32 = vector.iter().map(|&x| x * x).sum::<f32>().sqrt();

    if magnitude == 0.0 || !magnitude.is_finite() {
        return;
    }

    for x in vector.iter_mut() {
        *x /= magnitude;
    }
}

/// External encoder collaborator.
///
/// Implementations wrap whatever model backend turns text (or image
/// captions) into fixed-dimension vectors. The core treats the call as
/// an opaque synchronous dependency.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a piece of text into a `dimension()`-length vector.
    fn embed_text(&self, text: &str) -> Result<Embedding, RagError>;

    /// Output dimension of this provider.
    fn dimension(&self) -> usize;
}
