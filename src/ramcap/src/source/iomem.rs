//! /proc/iomem Parsing
//!
//! Extracts the top-level "System RAM" entries from the kernel's physical
//! resource map.

use super::traits::{normalize_ranges, SourceError};
use super::MemoryRange;
use std::fs;
use std::path::Path;

/// Resource name the kernel gives to usable RAM
pub const SYSTEM_RAM: &str = "System RAM";

/// Default location of the physical resource map
pub const IOMEM_PATH: &str = "/proc/iomem";

/// Usable RAM ranges parsed from an iomem listing
#[derive(Debug, Clone, Default)]
pub struct IomemMap {
    ranges: Vec<MemoryRange>,
}

impl IomemMap {
    /// Read and parse the live `/proc/iomem`
    pub fn load() -> Result<Self, SourceError> {
        Self::load_from(IOMEM_PATH)
    }

    /// Read and parse an iomem listing from a file
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::parse(&text)
    }

    /// Parse iomem text
    ///
    /// Nested (indented) entries describe sub-allocations of their parent and
    /// are ignored. Only entries named exactly "System RAM" are kept.
    pub fn parse(text: &str) -> Result<Self, SourceError> {
        let mut ranges = Vec::new();
        let mut saw_nonzero = false;
        let mut saw_any = false;

        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() || line.starts_with(char::is_whitespace) {
                continue;
            }

            let malformed = || SourceError::Malformed {
                line: index + 1,
                text: line.to_string(),
            };

            let (span, name) = line.split_once(" : ").ok_or_else(malformed)?;
            let (start, end) = span.trim().split_once('-').ok_or_else(malformed)?;
            let start = u64::from_str_radix(start, 16).map_err(|_| malformed())?;
            let end = u64::from_str_radix(end, 16).map_err(|_| malformed())?;

            saw_any = true;
            if start != 0 || end != 0 {
                saw_nonzero = true;
            }

            if name.trim() != SYSTEM_RAM {
                continue;
            }

            ranges.push(MemoryRange::new(start, end).ok_or_else(malformed)?);
        }

        // Unprivileged readers see every address as zero
        if saw_any && !saw_nonzero {
            return Err(SourceError::Unprivileged);
        }

        Ok(Self {
            ranges: normalize_ranges(ranges)?,
        })
    }

    pub fn ranges(&self) -> &[MemoryRange] {
        &self.ranges
    }

    pub fn into_ranges(self) -> Vec<MemoryRange> {
        self.ranges
    }
}
