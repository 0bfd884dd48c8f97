// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod ingestion;
pub mod rag;

// Re-export main types
pub use chunking::ChunkSplitter;
pub use config::{RagConfig, RerankWeights, RetrievalConfig};
pub use embeddings::{normalize_in_place, normalize_vector, Embedding, EmbeddingProvider};
pub use ingestion::{Chunk, Modality};
pub use rag::{
    CacheMetrics, FileSummary, FlatIpIndex, HeuristicBooster, RagError, RetrievedChunk, Retriever,
    ScoringStrategy, SearchResult, SessionStatus, SessionVectorStore, UpsertItem, VectorMetadata,
};
