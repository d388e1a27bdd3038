//! # ramcap
//!
//! Physical memory acquisition library - range enumeration, framing, digest
//! and compression.
//!
//! This library provides functionality to:
//! - Enumerate usable RAM from `/proc/iomem` and read it through `/dev/mem`
//! - Write it as a raw, LiME-structured or zero-padded image
//! - Stream the image to a file or to a single TCP client
//! - Hash the logical image and compress the wire stream on the fly
//!
//! ## Example
//!
//! ```no_run
//! use ramcap::{AcquisitionConfig, PhysicalMemory};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AcquisitionConfig {
//!     path: Some("/evidence/mem.lime".to_string()),
//!     format: Some("lime".to_string()),
//!     digest: Some("sha256".to_string()),
//!     ..Default::default()
//! };
//!
//! let memory = PhysicalMemory::open()?;
//! let report = ramcap::run(&config, &memory)?;
//! println!("{} bytes in {} ranges", report.logical_bytes, report.ranges.len());
//! # Ok(())
//! # }
//! ```

pub mod acquire;
pub mod config;
pub mod format;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod transfer;
pub mod transform;

// Re-export commonly used items
#[doc(inline)]
pub use acquire::{run, AcquireError, Acquisition, AcquisitionReport};
#[doc(inline)]
pub use config::{AcquisitionConfig, ConfigError, Destination, ValidatedConfig, WireFormat};
#[doc(inline)]
pub use format::{scan_structured, FormatError, RangeHeader, ScannedRange, HEADER_LEN};
#[doc(inline)]
pub use pipeline::{OutputPipeline, WriteError};
#[doc(inline)]
pub use sink::{ByteSink, DiskSink, NetworkSink, Sink, SinkError, WriteMode};
#[doc(inline)]
pub use source::{ImageSource, IomemMap, MemoryRange, PhysicalMemory, RangeSource, SourceError};
#[doc(inline)]
pub use transfer::{RangeOutcome, RangeReport};
#[doc(inline)]
pub use transform::{DigestAlgorithm, DigestOutcome};
