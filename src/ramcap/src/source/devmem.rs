//! Live Physical Memory Source
//!
//! Reads usable RAM of the running system through a physical memory device
//! such as `/dev/mem`, using the ranges reported by `/proc/iomem`.

use super::iomem::IomemMap;
use super::traits::{RangeSource, SourceError};
use super::MemoryRange;
use std::borrow::Cow;
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

/// Default physical memory device
pub const DEV_MEM: &str = "/dev/mem";

/// Physical memory of the running system
pub struct PhysicalMemory {
    device: File,
    pub device_path: PathBuf,
    ranges: Vec<MemoryRange>,
}

impl PhysicalMemory {
    /// Open `/dev/mem` with ranges from `/proc/iomem`
    pub fn open() -> Result<Self, SourceError> {
        Self::open_with(DEV_MEM, IomemMap::load()?)
    }

    /// Open an explicit device with an explicit range map
    pub fn open_with<P: AsRef<Path>>(device: P, map: IomemMap) -> Result<Self, SourceError> {
        let device_path = device.as_ref().to_path_buf();
        let device = File::open(&device_path)?;

        tracing::debug!(
            "Opened {} with {} RAM ranges",
            device_path.display(),
            map.ranges().len()
        );

        Ok(Self {
            device,
            device_path,
            ranges: map.into_ranges(),
        })
    }
}

impl RangeSource for PhysicalMemory {
    fn ranges(&self) -> &[MemoryRange] {
        &self.ranges
    }

    fn page(&self, address: u64, len: usize) -> Result<Cow<'_, [u8]>, SourceError> {
        let last = address + (len as u64).saturating_sub(1);
        if !self.ranges.iter().any(|r| r.contains(address) && r.contains(last)) {
            return Err(SourceError::OutOfRange { address, len });
        }

        let mut page = vec![0u8; len];
        self.device
            .read_exact_at(&mut page, address)
            .map_err(|source| SourceError::Read { address, source })?;
        Ok(Cow::Owned(page))
    }
}
