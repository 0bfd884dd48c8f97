// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session-scoped vector store manager.
//!
//! Owns the process-wide cache of loaded sessions. Sessions are loaded
//! lazily on first reference and kept behind a bounded LRU cache; every
//! mutation persists before the session lock is released, so evicting a
//! handle never loses state; the next reference reloads from disk.
//!
//! Locking discipline: the cache mutex is held only to resolve a
//! session handle; each session has its own mutex guarding the
//! assign-insert-persist sequence, so concurrent upserts to the same
//! session serialize while other sessions proceed independently.
//! Handle resolution keeps one live handle per session even across
//! eviction, so two callers can never mutate independent in-memory
//! copies of the same session.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use lru::LruCache;
use tracing::{debug, warn};

use crate::config::RagConfig;
use crate::embeddings::{normalize_in_place, normalize_vector, Embedding};
use crate::ingestion::{Chunk, Modality};
use crate::rag::errors::RagError;
use crate::rag::session_index::{SearchResult, SessionIndex, VectorMetadata};

/// One embedding plus the chunk it came from, ready for insertion.
#[derive(Debug, Clone)]
pub struct UpsertItem {
    pub embedding: Embedding,
    pub chunk: Chunk,
}

/// Session cache performance counters.
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Aggregate view of one session's contents.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub vectors: usize,
    pub dimension: usize,
    pub files: usize,
    pub modalities: Vec<Modality>,
}

/// Per-file aggregation for session file listings.
#[derive(Debug, Clone)]
pub struct FileSummary {
    pub file_name: String,
    pub chunk_count: usize,
    pub modalities: Vec<Modality>,
    /// Most recent recorded timestamp among the file's chunks.
    pub upload_date: Option<String>,
}

type SessionHandle = Arc<Mutex<SessionIndex>>;

/// Resident handles plus weak references to every handle still held by
/// an in-flight caller. Eviction only drops the resident strong
/// reference; `live` lets a later caller recover the surviving handle
/// instead of loading a second in-memory copy of the same session.
struct SessionCache {
    resident: LruCache<String, SessionHandle>,
    live: HashMap<String, Weak<Mutex<SessionIndex>>>,
}

/// Durable, session-scoped nearest-neighbor storage.
pub struct SessionVectorStore {
    dimension: usize,
    storage_dir: PathBuf,
    sessions: Mutex<SessionCache>,
    metrics: Mutex<CacheMetrics>,
}

impl SessionVectorStore {
    pub fn new(config: &RagConfig) -> Self {
        Self::with_storage(config.dimension, config.storage_dir.clone(), config.cache_capacity)
    }

    pub fn with_storage(dimension: usize, storage_dir: PathBuf, cache_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            dimension,
            storage_dir,
            sessions: Mutex::new(SessionCache {
                resident: LruCache::new(capacity),
                live: HashMap::new(),
            }),
            metrics: Mutex::new(CacheMetrics::default()),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Insert a batch of embeddings into a session and persist.
    ///
    /// Items whose embedding does not match the configured dimension
    /// are skipped with a warning; the rest are L2-normalized, assigned
    /// monotonic ids under the session lock, inserted and written
    /// through to disk. Returns the number actually inserted.
    pub fn upsert(&self, items: Vec<UpsertItem>, session_id: &str) -> Result<usize, RagError> {
        if session_id.trim().is_empty() {
            return Err(RagError::Validation(
                "session_id must not be empty".to_string(),
            ));
        }
        if items.is_empty() {
            return Ok(0);
        }

        let handle = self.session_handle(session_id)?;
        let mut session = handle.lock().unwrap_or_else(PoisonError::into_inner);

        let submitted = items.len();
        let mut inserted = 0;
        for (position, item) in items.into_iter().enumerate() {
            if item.embedding.dimension() != self.dimension {
                warn!(
                    session_id,
                    position,
                    expected = self.dimension,
                    actual = item.embedding.dimension(),
                    error_code = "DIMENSION_MISMATCH",
                    "skipping embedding with mismatched dimension"
                );
                continue;
            }

            let mut embedding = item.embedding.into_vec();
            normalize_in_place(&mut embedding);
            session.insert(&embedding, &item.chunk)?;
            inserted += 1;
        }

        if inserted > 0 {
            session.persist()?;
        }
        if inserted < submitted {
            debug!(
                session_id,
                submitted,
                inserted,
                "upsert completed with skipped items"
            );
        }
        Ok(inserted)
    }

    /// Similarity search within one session.
    ///
    /// The query is L2-normalized to match insertion-time
    /// normalization. Unknown or empty sessions yield an empty list.
    /// Result order is descending by inner-product score.
    pub fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        session_id: &str,
    ) -> Result<Vec<SearchResult>, RagError> {
        if session_id.trim().is_empty() {
            return Ok(Vec::new());
        }

        let handle = self.session_handle(session_id)?;
        let session = handle.lock().unwrap_or_else(PoisonError::into_inner);
        if session.is_empty() {
            return Ok(Vec::new());
        }

        let query = normalize_vector(query_embedding);
        session.search(&query, top_k)
    }

    /// Point lookup of one vector's metadata.
    pub fn get_metadata(
        &self,
        session_id: &str,
        vector_id: i64,
    ) -> Result<Option<VectorMetadata>, RagError> {
        if session_id.trim().is_empty() {
            return Ok(None);
        }
        let handle = self.session_handle(session_id)?;
        let session = handle.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(session.get(vector_id).cloned())
    }

    /// Full metadata map for a session, keyed by vector id string.
    /// Not a hot-path operation; used for citation lookups and file
    /// listings.
    pub fn get_session_metadata(
        &self,
        session_id: &str,
    ) -> Result<HashMap<String, VectorMetadata>, RagError> {
        if session_id.trim().is_empty() {
            return Ok(HashMap::new());
        }
        let handle = self.session_handle(session_id)?;
        let session = handle.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(session.metadata().clone())
    }

    /// Aggregate counts for one session.
    pub fn status(&self, session_id: &str) -> Result<SessionStatus, RagError> {
        let metadata = self.get_session_metadata(session_id)?;

        let mut files = HashSet::new();
        let mut modalities = HashSet::new();
        for meta in metadata.values() {
            files.insert(meta.file_name.clone());
            modalities.insert(meta.modality);
        }
        let mut modalities: Vec<Modality> = modalities.into_iter().collect();
        modalities.sort_by_key(|m| m.as_str());

        Ok(SessionStatus {
            vectors: metadata.len(),
            dimension: self.dimension,
            files: files.len(),
            modalities,
        })
    }

    /// Per-file summaries for a session, newest upload first.
    pub fn list_files(&self, session_id: &str) -> Result<Vec<FileSummary>, RagError> {
        let metadata = self.get_session_metadata(session_id)?;

        let mut by_file: BTreeMap<String, FileSummary> = BTreeMap::new();
        for meta in metadata.values() {
            let entry = by_file
                .entry(meta.file_name.clone())
                .or_insert_with(|| FileSummary {
                    file_name: meta.file_name.clone(),
                    chunk_count: 0,
                    modalities: Vec::new(),
                    upload_date: None,
                });
            entry.chunk_count += 1;
            if !entry.modalities.contains(&meta.modality) {
                entry.modalities.push(meta.modality);
            }
            if meta.timestamp.is_some() && meta.timestamp > entry.upload_date {
                entry.upload_date = meta.timestamp.clone();
            }
        }

        let mut files: Vec<FileSummary> = by_file.into_values().collect();
        files.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));
        Ok(files)
    }

    /// Snapshot of the session cache counters.
    pub fn cache_metrics(&self) -> CacheMetrics {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop all in-memory session handles. State is write-through, so
    /// the next reference to any session reloads it from disk.
    pub fn clear_cache(&self) {
        let mut cache = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        cache.resident.clear();
        cache.live.retain(|_, weak| weak.strong_count() > 0);
    }

    /// Resolve the handle for a session, loading it from disk on first
    /// reference. May evict the least recently used session; safe,
    /// because every mutation persists before its lock is released.
    fn session_handle(&self, session_id: &str) -> Result<SessionHandle, RagError> {
        let mut cache = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let mut metrics = self.metrics.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(handle) = cache.resident.get(session_id) {
            metrics.hits += 1;
            return Ok(handle.clone());
        }
        metrics.misses += 1;

        // An evicted handle may still be held by an in-flight caller;
        // reuse it so each session has exactly one in-memory copy and
        // one lock. Loading from disk here would fork the session state.
        let handle = match cache.live.get(session_id).and_then(Weak::upgrade) {
            Some(handle) => handle,
            None => {
                let session = SessionIndex::load(&self.storage_dir, session_id, self.dimension)?;
                Arc::new(Mutex::new(session))
            }
        };
        cache.live.retain(|_, weak| weak.strong_count() > 0);
        cache
            .live
            .insert(session_id.to_string(), Arc::downgrade(&handle));
        if let Some((evicted, _)) = cache.resident.push(session_id.to_string(), handle.clone()) {
            if evicted != session_id {
                metrics.evictions += 1;
                debug!(session_id = %evicted, "evicted session from cache");
            }
        }
        Ok(handle)
    }
}

impl std::fmt::Debug for SessionVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionVectorStore")
            .field("dimension", &self.dimension)
            .field("storage_dir", &self.storage_dir)
            .finish_non_exhaustive()
    }
}
