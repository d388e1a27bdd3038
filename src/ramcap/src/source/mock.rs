//! Mock Range Source
//!
//! Deterministic physical memory for testing the transfer loop.

use super::traits::{RangeSource, SourceError};
use super::MemoryRange;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// A mock range source with injectable read failures and slow pages
pub struct MockRangeSource {
    pub ranges: Vec<MemoryRange>,
    /// Page addresses whose read fails
    pub failing: HashSet<u64>,
    /// Page addresses whose read sleeps before returning
    pub slow: HashMap<u64, Duration>,
}

impl MockRangeSource {
    pub fn new(ranges: Vec<MemoryRange>) -> Self {
        Self {
            ranges,
            failing: HashSet::new(),
            slow: HashMap::new(),
        }
    }

    /// Build from `(start, end)` pairs
    pub fn from_pairs(pairs: &[(u64, u64)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|&(start, end)| MemoryRange { start, end })
                .collect(),
        )
    }

    pub fn fail_at(mut self, address: u64) -> Self {
        self.failing.insert(address);
        self
    }

    pub fn slow_at(mut self, address: u64, delay: Duration) -> Self {
        self.slow.insert(address, delay);
        self
    }

    /// The byte stored at a physical address
    pub fn byte_at(address: u64) -> u8 {
        // Never zero, so padding is distinguishable from data
        ((address >> 12) as u8 ^ (address as u8)) | 1
    }

    /// Expected contents of `len` bytes starting at `address`
    pub fn bytes(address: u64, len: usize) -> Vec<u8> {
        (0..len as u64).map(|i| Self::byte_at(address + i)).collect()
    }
}

impl RangeSource for MockRangeSource {
    fn ranges(&self) -> &[MemoryRange] {
        &self.ranges
    }

    fn page(&self, address: u64, len: usize) -> Result<Cow<'_, [u8]>, SourceError> {
        if let Some(delay) = self.slow.get(&address) {
            std::thread::sleep(*delay);
        }

        if self.failing.contains(&address) {
            return Err(SourceError::Read {
                address,
                source: std::io::Error::other("injected read failure"),
            });
        }

        if self.find_range(address).is_none() {
            return Err(SourceError::OutOfRange { address, len });
        }

        Ok(Cow::Owned(Self::bytes(address, len)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_pages_never_zero() {
        let source = MockRangeSource::from_pairs(&[(0, 0x1fff)]);
        let page = source.page(0x1000, 0x1000).unwrap();
        assert!(page.iter().all(|&b| b != 0));
        assert_eq!(&page[..], &MockRangeSource::bytes(0x1000, 0x1000)[..]);
    }

    #[test]
    fn test_mock_injected_failure() {
        let source = MockRangeSource::from_pairs(&[(0, 0x1fff)]).fail_at(0x1000);
        assert!(source.page(0, 0x1000).is_ok());
        assert!(matches!(
            source.page(0x1000, 0x1000),
            Err(SourceError::Read { .. })
        ));
    }

    #[test]
    fn test_mock_out_of_range() {
        let source = MockRangeSource::from_pairs(&[(0x1000, 0x1fff)]);
        assert!(source.page(0x4000, 0x1000).is_err());
    }
}
