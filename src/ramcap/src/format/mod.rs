//! Wire formats
//!
//! - `header` - the per-range header of the structured format
//! - `framer` - gap and header emission around the range sequence

pub mod framer;
pub mod header;

pub use framer::{Framer, FramingError};
pub use header::{
    scan_structured, FormatError, RangeHeader, ScannedRange, HEADER_LEN, LIME_MAGIC, LIME_VERSION,
};
