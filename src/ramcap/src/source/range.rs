//! Physical Memory Range Types
//!
//! Inclusive address spans reported as usable RAM.

use serde::{Deserialize, Serialize};

/// A span of physical memory, `end` inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemoryRange {
    pub start: u64,
    pub end: u64,
}

impl MemoryRange {
    /// Create a range, returning `None` when `start > end`
    pub fn new(start: u64, end: u64) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Number of bytes covered by the range
    ///
    /// Saturates at `u64::MAX` for the full address space.
    pub fn len(&self) -> u64 {
        (self.end - self.start).saturating_add(1)
    }

    /// A range always covers at least one byte
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.start && address <= self.end
    }

    /// Number of zero bytes separating `self` from a later range
    pub fn gap_to(&self, next: &MemoryRange) -> u64 {
        next.start.saturating_sub(self.end).saturating_sub(1)
    }

    /// Whether two ranges share at least one address
    pub fn overlaps(&self, other: &MemoryRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl std::fmt::Display for MemoryRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}-{:#x}", self.start, self.end)
    }
}
