//! Source positions: catalog file ids and source extents.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a file in the run's file catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct FileId(pub u32);

impl FileId {
    /// Create a new file ID.
    pub fn new(id: u32) -> Self {
        FileId(id)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file_{}", self.0)
    }
}

/// Source extent of an entity or reference.
///
/// Byte offsets are half-open: `[start, end)`. Line and column numbers are
/// carried as emitted by the producer (1-indexed lines, 0-indexed columns).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    /// Start byte offset (inclusive).
    pub start: u64,
    /// End byte offset (exclusive).
    pub end: u64,
    /// Line of the first byte.
    pub line: u32,
    /// Column of the first byte.
    pub col: u32,
    /// Line of the last byte.
    pub line_end: u32,
    /// Column of the last byte.
    pub col_end: u32,
}

impl Extent {
    /// Create an extent from byte offsets only.
    ///
    /// # Panics
    /// Panics if `start > end`. Record decoding rejects inverted extents
    /// before they reach this constructor.
    pub fn new(start: u64, end: u64) -> Self {
        assert!(
            start <= end,
            "Extent start ({}) must be <= end ({})",
            start,
            end
        );
        Extent {
            start,
            end,
            ..Extent::default()
        }
    }

    /// Set the starting line/column.
    pub fn with_start_position(mut self, line: u32, col: u32) -> Self {
        self.line = line;
        self.col = col;
        self
    }

    /// Set the ending line/column.
    pub fn with_end_position(mut self, line: u32, col: u32) -> Self {
        self.line_end = line;
        self.col_end = col;
        self
    }

    /// Length in bytes.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Check if the extent covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check whether a byte offset falls inside this extent.
    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.start && offset < self.end
    }
}

// ============================================================================
// Tests
// ============================================================================
