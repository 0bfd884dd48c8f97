// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Query-side retrieval pipeline.
//!
//! Turns a raw query into a ranked, policy-filtered result list:
//! embed, over-fetch from the session store, filter by modality and
//! score threshold, rerank with an additive heuristic, truncate. An
//! empty output is the designed "insufficient information" signal for
//! the generation collaborator, never an error.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::RerankWeights;
use crate::embeddings::EmbeddingProvider;
use crate::ingestion::Modality;
use crate::rag::errors::RagError;
use crate::rag::session_index::{SearchResult, VectorMetadata};
use crate::rag::store::SessionVectorStore;

/// Over-fetch multiplier applied to `top_k` before filtering.
pub const OVERFETCH_FACTOR: usize = 5;
/// Hard cap on the candidate count requested from the store.
pub const MAX_SEARCH_K: usize = 100;

/// A retrieval result ready for citation-bound prompt construction.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub vector_id: i64,
    /// Raw similarity score from the index.
    pub score: f32,
    /// Score after heuristic boosts; the final sort key.
    pub rerank_score: f32,
    pub metadata: VectorMetadata,
}

/// Secondary scoring pass applied after threshold filtering.
///
/// Takes the raw query and one surviving candidate and returns the
/// boosted score used as the final sort key; substituting a strategy
/// never touches retrieval control flow.
pub trait ScoringStrategy: Send + Sync {
    fn score(&self, query: &str, candidate: &SearchResult) -> f32;
}

/// Default additive-boost reranker.
///
/// Boosts on top of the raw similarity: verbatim query match in the
/// content, query token in the file name, image modality. Weights are
/// configurable but the defaults are the reference values.
#[derive(Debug, Clone, Default)]
pub struct HeuristicBooster {
    weights: RerankWeights,
}

impl HeuristicBooster {
    pub fn new(weights: RerankWeights) -> Self {
        Self { weights }
    }
}

impl ScoringStrategy for HeuristicBooster {
    fn score(&self, query: &str, candidate: &SearchResult) -> f32 {
        let mut score = candidate.score;
        let query_lower = query.to_lowercase();

        if !query_lower.is_empty()
            && candidate.metadata.content.to_lowercase().contains(&query_lower)
        {
            score += self.weights.content_match;
        }

        let file_name_lower = candidate.metadata.file_name.to_lowercase();
        if query_lower
            .split_whitespace()
            .any(|token| file_name_lower.contains(token))
        {
            score += self.weights.file_name_match;
        }

        if candidate.metadata.modality == Modality::Image {
            score += self.weights.image_modality;
        }

        score
    }
}

/// Session-scoped retriever over the vector store and an external
/// embedding collaborator.
pub struct Retriever {
    store: Arc<SessionVectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    scorer: Box<dyn ScoringStrategy>,
}

impl Retriever {
    pub fn new(store: Arc<SessionVectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embedder,
            scorer: Box::new(HeuristicBooster::default()),
        }
    }

    /// Replace the rerank strategy.
    pub fn with_scorer(mut self, scorer: Box<dyn ScoringStrategy>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Retrieve up to `top_k` chunks for `query_text` from the session
    /// identified by `chat_id`.
    ///
    /// Returns an empty list when `chat_id` is absent (there is no
    /// cross-session retrieval), when the session is empty or unknown,
    /// or when no candidate reaches `min_score`. `session_files`, when
    /// given, restricts results to those file names.
    pub fn retrieve(
        &self,
        query_text: &str,
        chat_id: Option<&str>,
        top_k: usize,
        modality_filter: Option<Modality>,
        min_score: f32,
        session_files: Option<&HashSet<String>>,
    ) -> Result<Vec<RetrievedChunk>, RagError> {
        let Some(chat_id) = chat_id.filter(|id| !id.trim().is_empty()) else {
            debug!("retrieve called without chat_id; nothing to search");
            return Ok(Vec::new());
        };
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed_text(query_text)?;

        // Over-fetch: downstream filters only remove candidates.
        let search_k = top_k.saturating_mul(OVERFETCH_FACTOR).min(MAX_SEARCH_K);
        let mut candidates = match self.store.search(query_embedding.data(), search_k, chat_id) {
            Ok(candidates) => candidates,
            // Validation failures degrade to an empty result, matching
            // the empty-session behavior; persistence failures surface.
            Err(error) if error.is_recoverable() => {
                warn!(
                    chat_id,
                    error_code = error.error_code(),
                    %error,
                    "search failed; returning empty result"
                );
                return Ok(Vec::new());
            }
            Err(error) => return Err(error),
        };

        if let Some(modality) = modality_filter {
            candidates.retain(|c| c.metadata.modality == modality);
        }
        if let Some(files) = session_files {
            candidates.retain(|c| files.contains(&c.metadata.file_name));
        }

        // Threshold applies to the raw similarity, before boosts.
        candidates.retain(|c| c.score >= min_score);
        if candidates.is_empty() {
            debug!(
                chat_id,
                min_score, "no candidates above threshold; returning empty result"
            );
            return Ok(Vec::new());
        }

        let mut ranked: Vec<RetrievedChunk> = candidates
            .into_iter()
            .map(|candidate| {
                let rerank_score = self.scorer.score(query_text, &candidate);
                RetrievedChunk {
                    vector_id: candidate.vector_id,
                    score: candidate.score,
                    rerank_score,
                    metadata: candidate.metadata,
                }
            })
            .collect();

        // sort_by is stable: equal boosted scores keep store order.
        ranked.sort_by(|a, b| {
            b.rerank_score
                .partial_cmp(&a.rerank_score)
                .unwrap_or(Ordering::Equal)
        });
        ranked.truncate(top_k);

        debug!(chat_id, results = ranked.len(), "retrieval complete");
        Ok(ranked)
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
