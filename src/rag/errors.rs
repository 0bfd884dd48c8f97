// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the session retrieval core
//!
//! Covers the failure taxonomy of the store and retriever:
//! - Validation errors (missing session id, dimension mismatch)
//! - Corrupt persisted state (unreadable index/metadata files)
//! - Integrity violations (index and metadata map out of sync)
//! - I/O and serialization failures during persistence

use thiserror::Error;

/// Errors raised by the session vector store and retriever.
#[derive(Error, Debug)]
pub enum RagError {
    /// Caller-supplied input was rejected before any state changed
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Embedding length does not match the configured dimension
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Persisted index or metadata could not be read or is internally
    /// inconsistent; the session was reinitialized empty
    #[error("Corrupt state for session '{session_id}': {reason}")]
    CorruptState { session_id: String, reason: String },

    /// A vector id present in the index has no metadata entry
    #[error("Integrity violation in session '{session_id}': vector {vector_id} has no metadata entry")]
    IntegrityViolation { session_id: String, vector_id: i64 },

    /// The embedding collaborator failed to produce a vector
    #[error("Embedding provider error: {0}")]
    Embedding(String),

    /// I/O failure while persisting or loading a session
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata (de)serialization failure
    #[error("Metadata serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Index file (de)serialization failure
    #[error("Index encoding error: {0}")]
    IndexCodec(#[from] bincode::Error),
}

impl RagError {
    /// Stable code for logging and metrics.
    pub fn error_code(&self) -> &'static str {
        match self {
            RagError::Validation(_) => "VALIDATION",
            RagError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            RagError::CorruptState { .. } => "CORRUPT_STATE",
            RagError::IntegrityViolation { .. } => "INTEGRITY_VIOLATION",
            RagError::Embedding(_) => "EMBEDDING_FAILED",
            RagError::Io(_) => "IO_ERROR",
            RagError::Serialization(_) => "SERIALIZATION_ERROR",
            RagError::IndexCodec(_) => "INDEX_CODEC_ERROR",
        }
    }

    /// Whether the condition is handled locally by skipping the
    /// offending item or reinitializing the session, rather than
    /// failing the whole call.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RagError::Validation(_)
                | RagError::DimensionMismatch { .. }
                | RagError::CorruptState { .. }
                | RagError::IntegrityViolation { .. }
        )
    }
}
