//! Range Source Trait
//!
//! Core abstraction for enumerating usable RAM and viewing its pages.

use super::MemoryRange;
use std::borrow::Cow;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed iomem line {line}: {text:?}")]
    Malformed { line: usize, text: String },

    #[error("Ranges {first} and {second} overlap")]
    Overlap {
        first: MemoryRange,
        second: MemoryRange,
    },

    #[error("iomem addresses are hidden; run as root")]
    Unprivileged,

    #[error("Page at {address:#x} ({len} bytes) is outside every range")]
    OutOfRange { address: u64, len: usize },

    #[error("Failed to read page at {address:#x}: {source}")]
    Read {
        address: u64,
        #[source]
        source: std::io::Error,
    },
}

/// Trait for physical memory providers (live system, image file, etc.)
///
/// Ranges are reported in ascending, non-overlapping order.
pub trait RangeSource {
    /// Ranges tagged as usable RAM
    fn ranges(&self) -> &[MemoryRange];

    /// Readable view of `len` bytes starting at `address`
    ///
    /// Callers only ask for whole pages lying inside a single range.
    fn page(&self, address: u64, len: usize) -> Result<Cow<'_, [u8]>, SourceError>;

    /// Find the range containing the given address
    fn find_range(&self, address: u64) -> Option<&MemoryRange> {
        self.ranges().iter().find(|r| r.contains(address))
    }

    /// Total bytes across all ranges
    fn total_len(&self) -> u64 {
        self.ranges().iter().map(MemoryRange::len).sum()
    }
}

/// Sort ranges and reject overlaps
pub fn normalize_ranges(mut ranges: Vec<MemoryRange>) -> Result<Vec<MemoryRange>, SourceError> {
    ranges.sort();
    for pair in ranges.windows(2) {
        if pair[0].overlaps(&pair[1]) {
            return Err(SourceError::Overlap {
                first: pair[0],
                second: pair[1],
            });
        }
    }
    Ok(ranges)
}
