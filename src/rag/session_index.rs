// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-session pairing of vector index and metadata map, with durable
//! persistence.
//!
//! On disk each session owns one directory under the storage root:
//! `vectors.index` (bincode-encoded [`FlatIpIndex`]) and `metadata.json`
//! (vector id string → metadata record). Both files are rewritten
//! together after every mutation via temp-file-and-rename, so a crash
//! leaves either the previous consistent pair or the new one.
//!
//! An unreadable or dimension-mismatched file is treated as corrupt
//! state: the offending pair is backed up, the session reinitializes
//! empty and a warning is emitted. Prior vectors for that session must
//! be re-ingested.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ingestion::{Chunk, Modality};
use crate::rag::errors::RagError;
use crate::rag::flat_index::{FlatIpIndex, NO_MATCH_ID};

const INDEX_FILE: &str = "vectors.index";
const METADATA_FILE: &str = "metadata.json";

/// Persisted metadata record for one stored vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMetadata {
    pub vector_id: i64,
    pub session_id: String,
    pub content: String,
    pub file_name: String,
    pub modality: Modality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_ts: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_ts: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_end: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filepath: Option<String>,
}

impl VectorMetadata {
    /// Build the persisted record from an extracted chunk.
    pub fn from_chunk(chunk: &Chunk, vector_id: i64, session_id: &str) -> Self {
        Self {
            vector_id,
            session_id: session_id.to_string(),
            content: chunk.content.clone(),
            file_name: chunk.file_name.clone(),
            modality: chunk.modality,
            page_number: chunk.page_number,
            timestamp: chunk.timestamp.clone(),
            start_ts: chunk.start_ts,
            end_ts: chunk.end_ts,
            char_start: chunk.char_start,
            char_end: chunk.char_end,
            width: chunk.width,
            height: chunk.height,
            bbox: chunk.bbox.clone(),
            filepath: chunk.filepath.clone(),
        }
    }
}

/// One result row from a session search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub vector_id: i64,
    /// Inner-product similarity against the normalized query.
    pub score: f32,
    pub metadata: VectorMetadata,
}

/// In-memory state of one session: index plus metadata map.
///
/// Invariant: every id in the index has a metadata entry keyed by its
/// string form, and vice versa. Both structures are persisted together
/// after every mutation to keep the invariant durable.
#[derive(Debug)]
pub struct SessionIndex {
    session_id: String,
    dir: PathBuf,
    index: FlatIpIndex,
    metadata: HashMap<String, VectorMetadata>,
}

impl SessionIndex {
    /// Load a session from disk, or start it empty if nothing is
    /// persisted yet. Corrupt files are backed up and the session is
    /// reinitialized empty.
    ///
    /// Nothing is written to disk here; the session directory only
    /// comes into existence on the first persisted upsert.
    pub fn load(root: &Path, session_id: &str, dimension: usize) -> Result<Self, RagError> {
        let dir = root.join(session_id);
        let index_path = dir.join(INDEX_FILE);
        let metadata_path = dir.join(METADATA_FILE);

        if !index_path.exists() && !metadata_path.exists() {
            debug!(session_id, "initializing empty session index");
            return Ok(Self::empty(session_id, dir, dimension));
        }

        let index = match Self::read_index(&index_path, dimension) {
            Ok(index) => index,
            Err(reason) => {
                warn!(
                    session_id,
                    error_code = "CORRUPT_STATE",
                    %reason,
                    "discarding unreadable session index; vectors must be re-ingested"
                );
                backup_file(&index_path);
                backup_file(&metadata_path);
                return Ok(Self::empty(session_id, dir, dimension));
            }
        };

        let metadata = match Self::read_metadata(&metadata_path) {
            Ok(metadata) => metadata,
            Err(reason) => {
                warn!(
                    session_id,
                    error_code = "CORRUPT_STATE",
                    %reason,
                    "discarding unreadable session metadata; vectors must be re-ingested"
                );
                backup_file(&index_path);
                backup_file(&metadata_path);
                return Ok(Self::empty(session_id, dir, dimension));
            }
        };

        if index.len() != metadata.len() {
            // Signals a past partial write; affected rows are dropped
            // one by one at search time.
            warn!(
                session_id,
                error_code = "INTEGRITY_VIOLATION",
                index_len = index.len(),
                metadata_len = metadata.len(),
                "index and metadata map disagree on element count"
            );
        }

        debug!(session_id, vectors = index.len(), "loaded session from disk");
        Ok(Self {
            session_id: session_id.to_string(),
            dir,
            index,
            metadata,
        })
    }

    fn empty(session_id: &str, dir: PathBuf, dimension: usize) -> Self {
        Self {
            session_id: session_id.to_string(),
            dir,
            index: FlatIpIndex::new(dimension),
            metadata: HashMap::new(),
        }
    }

    fn read_index(path: &Path, dimension: usize) -> Result<FlatIpIndex, String> {
        if !path.exists() {
            return Ok(FlatIpIndex::new(dimension));
        }
        let bytes = fs::read(path).map_err(|e| e.to_string())?;
        let index: FlatIpIndex = bincode::deserialize(&bytes).map_err(|e| e.to_string())?;
        if index.dimension() != dimension {
            return Err(format!(
                "persisted dimension {} does not match configured {}",
                index.dimension(),
                dimension
            ));
        }
        Ok(index)
    }

    fn read_metadata(path: &Path) -> Result<HashMap<String, VectorMetadata>, String> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let bytes = fs::read(path).map_err(|e| e.to_string())?;
        serde_json::from_slice(&bytes).map_err(|e| e.to_string())
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    /// Next monotonic vector id: `max(existing) + 1`, or 0 when empty.
    pub fn next_vector_id(&self) -> i64 {
        self.index.max_id().map(|id| id + 1).unwrap_or(0)
    }

    /// Insert an already-normalized embedding with its chunk metadata.
    /// Returns the assigned vector id. Does not persist; callers batch
    /// insertions and call [`persist`](Self::persist) once.
    pub fn insert(&mut self, embedding: &[f32], chunk: &Chunk) -> Result<i64, RagError> {
        let vector_id = self.next_vector_id();
        self.index.add_with_id(vector_id, embedding)?;
        self.metadata.insert(
            vector_id.to_string(),
            VectorMetadata::from_chunk(chunk, vector_id, &self.session_id),
        );
        Ok(vector_id)
    }

    /// Nearest-neighbor search over this session with metadata join.
    ///
    /// The query must already be normalized. Sentinel ids are dropped;
    /// ids without a metadata entry are dropped with an integrity
    /// warning. `top_k` is clamped to the element count.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>, RagError> {
        let pairs = self.index.search(query, top_k)?;

        let mut results = Vec::with_capacity(pairs.len());
        for (score, vector_id) in pairs {
            if vector_id == NO_MATCH_ID {
                continue;
            }
            match self.metadata.get(&vector_id.to_string()) {
                Some(metadata) => results.push(SearchResult {
                    vector_id,
                    score,
                    metadata: metadata.clone(),
                }),
                None => {
                    warn!(
                        session_id = %self.session_id,
                        vector_id,
                        error_code = "INTEGRITY_VIOLATION",
                        "dropping result with no metadata entry"
                    );
                }
            }
        }

        Ok(results)
    }

    pub fn get(&self, vector_id: i64) -> Option<&VectorMetadata> {
        self.metadata.get(&vector_id.to_string())
    }

    pub fn metadata(&self) -> &HashMap<String, VectorMetadata> {
        &self.metadata
    }

    /// Write the index and metadata map to the session directory.
    ///
    /// Each file goes through a temp write plus rename; the metadata
    /// file stays human-readable JSON for the citation viewer.
    pub fn persist(&self) -> Result<(), RagError> {
        fs::create_dir_all(&self.dir)?;

        let index_bytes = bincode::serialize(&self.index)?;
        write_atomic(&self.dir.join(INDEX_FILE), &index_bytes)?;

        let metadata_bytes = serde_json::to_vec_pretty(&self.metadata)?;
        write_atomic(&self.dir.join(METADATA_FILE), &metadata_bytes)?;

        debug!(
            session_id = %self.session_id,
            vectors = self.index.len(),
            "persisted session"
        );
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

/// Move a suspect file aside so a later investigation can recover it.
fn backup_file(path: &Path) {
    if !path.exists() {
        return;
    }
    let backup = PathBuf::from(format!("{}.backup", path.display()));
    if let Err(error) = fs::rename(path, &backup) {
        warn!(path = %path.display(), %error, "failed to back up corrupt file");
    }
}
