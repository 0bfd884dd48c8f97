// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Deterministic text segmentation for ingestion.
//!
//! Splits extracted text into overlapping windows, preferring to end a
//! window at a sentence terminator (". ") or newline so chunks stay
//! readable when rendered as citations. Identical input and parameters
//! always yield identical output.

/// Splits text into overlapping windows of bounded size.
///
/// Window sizes are measured in characters, not bytes, so multi-byte
/// UTF-8 input never gets cut inside a code point.
#[derive(Debug, Clone)]
pub struct ChunkSplitter {
    /// Minimum window size a boundary cut is allowed to produce.
    pub min_size: usize,
    /// Maximum window size in characters.
    pub max_size: usize,
    /// Fraction of `max_size` carried over into the next window.
    pub overlap_ratio: f32,
}

impl Default for ChunkSplitter {
    fn default() -> Self {
        Self {
            min_size: 200,
            max_size: 500,
            overlap_ratio: 0.2,
        }
    }
}

impl ChunkSplitter {
    pub fn new(min_size: usize, max_size: usize, overlap_ratio: f32) -> Self {
        Self {
            min_size,
            max_size,
            overlap_ratio,
        }
    }

    /// Split `text` into overlapping windows.
    ///
    /// Returns an empty vector for empty or whitespace-only input.
    /// Each window is at most `max_size` characters; a window is ended
    /// early at the last ". " or newline inside it when the cut would
    /// not make the window shorter than `min_size`. The next window
    /// restarts `overlap` characters before the previous end, where
    /// `overlap = floor(max_size * overlap_ratio)`.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.trim().chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let overlap = (self.max_size as f32 * self.overlap_ratio) as usize;
        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < chars.len() {
            let mut end = (start + self.max_size).min(chars.len());

            if let Some(boundary) = last_boundary(&chars, start, end) {
                if boundary + 1 - start >= self.min_size {
                    end = boundary + 1;
                }
            }

            let chunk: String = chars[start..end].iter().collect();
            let chunk = chunk.trim();
            if !chunk.is_empty() {
                chunks.push(chunk.to_string());
            }

            if end == chars.len() {
                break;
            }
            let next = end.saturating_sub(overlap);
            // A window never shrinks below min_size, so this only trips
            // on degenerate parameters (overlap >= window size).
            start = if next > start { next } else { end };
        }

        chunks
    }
}

/// Position of the last sentence terminator ('.' of a ". " pair) or
/// newline fully inside `[start, end)`, mirroring `str.rfind` semantics.
fn last_boundary(chars: &[char], start: usize, end: usize) -> Option<usize> {
    let mut best: Option<usize> = None;
    for i in start..end {
        let hit = chars[i] == '\n' || (chars[i] == '.' && i + 1 < end && chars[i + 1] == ' ');
        if hit {
            best = Some(i);
        }
    }
    best
}
