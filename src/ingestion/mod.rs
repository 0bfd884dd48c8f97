// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Data model for extracted content.
//!
//! Extraction itself (PDF/DOCX parsing, OCR, transcription) lives in
//! external collaborators; this module only defines the `Chunk` record
//! they produce and the modality taxonomy used for filtering.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source modality of an ingested chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Pdf,
    Docx,
    Image,
    Audio,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Pdf => "pdf",
            Modality::Docx => "docx",
            Modality::Image => "image",
            Modality::Audio => "audio",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of extracted content with its provenance metadata.
///
/// Immutable once created; ownership passes to the store on upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub file_name: String,
    pub modality: Modality,
    /// Page of the source document (PDF/DOCX).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    /// Upload or extraction time, opaque to the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Transcript segment start, in seconds (audio).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_ts: Option<f64>,
    /// Transcript segment end, in seconds (audio).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_ts: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_end: Option<usize>,
    /// Image dimensions (image chunks).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Bounding box within the source page/image, serialized form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<String>,
    /// Path of the stored source file, for the citation viewer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filepath: Option<String>,
}

impl Chunk {
    /// Minimal chunk with all optional provenance fields unset.
    pub fn new(content: impl Into<String>, file_name: impl Into<String>, modality: Modality) -> Self {
        Self {
            content: content.into(),
            file_name: file_name.into(),
            modality,
            page_number: None,
            timestamp: None,
            start_ts: None,
            end_ts: None,
            char_start: None,
            char_end: None,
            width: None,
            height: None,
            bbox: None,
            filepath: None,
        }
    }
}
