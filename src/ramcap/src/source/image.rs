//! Image File Source
//!
//! Serves pages out of an existing raw memory image where file offset equals
//! physical address (the layout `padded` output produces when the leading gap
//! is padded).

use super::traits::{normalize_ranges, RangeSource, SourceError};
use super::MemoryRange;
use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Memory-mapped linear image
pub struct ImageSource {
    mmap: Mmap,
    ranges: Vec<MemoryRange>,
    pub path: PathBuf,
}

impl ImageSource {
    /// Map an image and serve the given ranges out of it
    ///
    /// Ranges are clipped to the image size; ranges lying entirely past the
    /// end of the file are dropped.
    pub fn open<P: AsRef<Path>>(path: P, ranges: Vec<MemoryRange>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;

        // SAFETY: the mapping is read-only and the file stays open for its lifetime
        let mmap = unsafe { Mmap::map(&file) }?;

        let size = mmap.len() as u64;
        let ranges = ranges
            .into_iter()
            .filter(|r| r.start < size)
            .filter_map(|r| MemoryRange::new(r.start, r.end.min(size - 1)))
            .collect();
        let ranges = normalize_ranges(ranges)?;

        tracing::debug!(
            "Mapped image {} ({} MB) with {} ranges",
            path.display(),
            mmap.len() / 1_000_000,
            ranges.len()
        );

        Ok(Self { mmap, ranges, path })
    }

    /// Map an image as a single range covering the whole file
    pub fn open_whole<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let size = std::fs::metadata(path.as_ref())?.len();
        let ranges = MemoryRange::new(0, size.saturating_sub(1))
            .filter(|_| size > 0)
            .into_iter()
            .collect();
        Self::open(path, ranges)
    }

    pub fn image_len(&self) -> usize {
        self.mmap.len()
    }
}

impl RangeSource for ImageSource {
    fn ranges(&self) -> &[MemoryRange] {
        &self.ranges
    }

    fn page(&self, address: u64, len: usize) -> Result<Cow<'_, [u8]>, SourceError> {
        let last = address + (len as u64).saturating_sub(1);
        if !self.ranges.iter().any(|r| r.contains(address) && r.contains(last)) {
            return Err(SourceError::OutOfRange { address, len });
        }

        let offset = address as usize;
        Ok(Cow::Borrowed(&self.mmap[offset..offset + len]))
    }
}
