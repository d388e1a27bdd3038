//! Range Source Abstraction
//!
//! Enumerates usable physical RAM and hands out page views:
//! - Live system via `PhysicalMemory` (`/proc/iomem` + `/dev/mem`)
//! - Raw image files via `ImageSource`
//! - Mock sources for testing

mod devmem;
mod image;
pub mod iomem;
#[cfg(test)]
mod mock;
mod range;
mod traits;

pub use devmem::{PhysicalMemory, DEV_MEM};
pub use image::ImageSource;
pub use iomem::IomemMap;
#[cfg(test)]
pub use mock::MockRangeSource;
pub use range::MemoryRange;
pub use traits::{normalize_ranges, RangeSource, SourceError};
