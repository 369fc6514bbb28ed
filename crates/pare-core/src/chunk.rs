//! # Chunk Partitioning
//!
//! Pure partition math for the chunk bisector.
//!
//! A partition splits a target list of length `N` into contiguous,
//! non-overlapping chunks of `ceil(N / C)` targets each (the last one may be
//! shorter). Partitions always cover the whole list and never contain an
//! empty chunk.

use crate::primitives::DEFAULT_INITIAL_CHUNKS;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A contiguous slice of the current target list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk within its partition.
    pub index: usize,
    /// First target index (inclusive).
    pub start: usize,
    /// Last target index (exclusive).
    pub end: usize,
}

impl Chunk {
    /// Number of targets in the chunk.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Chunks are never empty; provided for clippy's `len_without_is_empty`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Target index range covered by the chunk.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Split `len` targets into at most `chunks` chunks using ceiling division.
///
/// `chunks` is clamped to `1..=len`; an empty list yields no chunks.
#[must_use]
pub fn partition(len: usize, chunks: usize) -> Vec<Chunk> {
    if len == 0 {
        return Vec::new();
    }

    let chunks = chunks.clamp(1, len);
    let size = len.div_ceil(chunks);

    (0..len)
        .step_by(size)
        .enumerate()
        .map(|(index, start)| Chunk {
            index,
            start,
            end: (start + size).min(len),
        })
        .collect()
}

/// How the chunk count evolves during bisection.
///
/// The classic schedule starts at two chunks, doubles on a fruitless
/// partition, and returns to two chunks after every accepted removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GranularityPolicy {
    /// Chunk count for a fresh target list (at least 2).
    pub initial_chunks: usize,
    /// Return to `initial_chunks` after a successful removal.
    pub reset_on_success: bool,
}

impl Default for GranularityPolicy {
    fn default() -> Self {
        Self {
            initial_chunks: DEFAULT_INITIAL_CHUNKS,
            reset_on_success: true,
        }
    }
}

impl GranularityPolicy {
    /// Policy with the given starting chunk count (values below 2 become 2).
    #[must_use]
    pub fn new(initial_chunks: usize) -> Self {
        Self {
            initial_chunks: initial_chunks.max(DEFAULT_INITIAL_CHUNKS),
            ..Self::default()
        }
    }

    /// Keep or drop the reset after a success.
    #[must_use]
    pub fn with_reset_on_success(mut self, reset: bool) -> Self {
        self.reset_on_success = reset;
        self
    }

    /// Chunk count for a list of `len` targets.
    #[must_use]
    pub fn start(&self, len: usize) -> usize {
        self.initial_chunks
            .max(DEFAULT_INITIAL_CHUNKS)
            .min(len)
            .max(1)
    }

    /// Chunk count after a removal left `len` targets.
    #[must_use]
    pub fn after_success(&self, current: usize, len: usize) -> usize {
        if self.reset_on_success {
            self.start(len)
        } else {
            current.min(len).max(1)
        }
    }

    /// Finer chunk count after a fruitless partition, or `None` once every
    /// target has already been tried on its own.
    #[must_use]
    pub fn refine(&self, current: usize, len: usize) -> Option<usize> {
        if current >= len {
            None
        } else {
            Some(current.saturating_mul(2).min(len))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
