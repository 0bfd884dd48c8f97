// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Runtime configuration for the retrieval core.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the store and retriever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Embedding dimension, fixed per deployment (CLIP text/image: 512).
    pub dimension: usize,
    /// Root directory holding one subdirectory per session.
    pub storage_dir: PathBuf,
    /// Maximum number of session indexes kept in memory at once.
    pub cache_capacity: usize,
    pub retrieval: RetrievalConfig,
}

/// Defaults for the query path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Result count returned to the generation collaborator.
    pub top_k: usize,
    /// Minimum cosine similarity a candidate must reach before rerank.
    pub min_score: f32,
    pub weights: RerankWeights,
}

/// Additive boosts applied during the rerank pass.
///
/// Exposed as configuration, but the defaults are the reference values;
/// changing them changes ranking reproducibility.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RerankWeights {
    /// Query appears verbatim (case-insensitive) in the content.
    pub content_match: f32,
    /// A query token appears in the file name.
    pub file_name_match: f32,
    /// Candidate is an image chunk.
    pub image_modality: f32,
}

impl Default for RerankWeights {
    fn default() -> Self {
        Self {
            content_match: 0.10,
            file_name_match: 0.05,
            image_modality: 0.03,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: 0.25,
            weights: RerankWeights::default(),
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            dimension: 512,
            storage_dir: PathBuf::from("storage/sessions"),
            cache_capacity: 32,
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl RagConfig {
    /// Build a config from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    ///
    /// Recognized variables: `RAG_EMBEDDING_DIM`, `RAG_STORAGE_DIR`,
    /// `RAG_SESSION_CACHE_CAPACITY`, `RAG_TOP_K`, `RAG_MIN_SCORE`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            dimension: env_parse("RAG_EMBEDDING_DIM").unwrap_or(defaults.dimension),
            storage_dir: std::env::var("RAG_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            cache_capacity: env_parse("RAG_SESSION_CACHE_CAPACITY")
                .unwrap_or(defaults.cache_capacity),
            retrieval: RetrievalConfig {
                top_k: env_parse("RAG_TOP_K").unwrap_or(defaults.retrieval.top_k),
                min_score: env_parse("RAG_MIN_SCORE").unwrap_or(defaults.retrieval.min_score),
                weights: defaults.retrieval.weights,
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
