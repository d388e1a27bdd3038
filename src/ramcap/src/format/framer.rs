//! Wire format framing around the range sequence
//!
//! The format is fixed for the whole run. `raw` emits nothing between
//! ranges, `lime` emits a header before each range, `padded` fills the gap
//! since the previous range with zeros.

use super::header::RangeHeader;
use crate::config::WireFormat;
use crate::pipeline::{OutputPipeline, WriteError};
use crate::source::MemoryRange;
use std::io::Write;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FramingError {
    #[error("Error writing header {range}: {source}")]
    Header {
        range: MemoryRange,
        #[source]
        source: WriteError,
    },

    #[error("Error writing padding {from:#x} - {to:#x}: {source}")]
    Padding {
        from: u64,
        to: u64,
        #[source]
        source: WriteError,
    },
}

/// Framing state for one run
pub struct Framer {
    format: WireFormat,
    pad_leading_gap: bool,
    zero_page: Vec<u8>,
    previous: Option<MemoryRange>,
    padded_bytes: u64,
}

impl Framer {
    pub fn new(format: WireFormat, page_size: usize, pad_leading_gap: bool) -> Self {
        Self {
            format,
            pad_leading_gap,
            zero_page: vec![0u8; page_size],
            previous: None,
            padded_bytes: 0,
        }
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Whether failed or skipped bytes inside a range are replaced by zeros
    pub fn compensates(&self) -> bool {
        self.format != WireFormat::Raw
    }

    /// Zero bytes to emit before `range` in padded mode
    pub fn gap_before(&self, range: &MemoryRange) -> u64 {
        match &self.previous {
            Some(previous) => previous.gap_to(range),
            None if self.pad_leading_gap => range.start,
            None => 0,
        }
    }

    /// Emit whatever precedes the bytes of `range`
    ///
    /// A failure here aborts the run.
    pub fn begin_range<W: Write>(
        &mut self,
        pipeline: &mut OutputPipeline<W>,
        range: &MemoryRange,
    ) -> Result<(), FramingError> {
        match self.format {
            WireFormat::Raw => Ok(()),
            WireFormat::Lime => {
                let header = RangeHeader::for_range(range).encode();
                pipeline
                    .write(&header)
                    .map(|_| ())
                    .map_err(|source| FramingError::Header {
                        range: *range,
                        source,
                    })
            }
            WireFormat::Padded => {
                let gap = self.gap_before(range);
                self.pad(pipeline, gap)
                    .map_err(|source| FramingError::Padding {
                        from: range.start - gap,
                        to: range.start.saturating_sub(1),
                        source,
                    })
            }
        }
    }

    /// Record that `range` has been processed
    pub fn end_range(&mut self, range: &MemoryRange) {
        self.previous = Some(*range);
    }

    /// Emit `len` zero bytes in page-sized writes
    pub fn pad<W: Write>(
        &mut self,
        pipeline: &mut OutputPipeline<W>,
        mut len: u64,
    ) -> Result<(), WriteError> {
        while len > 0 {
            let chunk = len.min(self.zero_page.len() as u64) as usize;
            pipeline.write(&self.zero_page[..chunk])?;
            self.padded_bytes += chunk as u64;
            len -= chunk as u64;
        }
        Ok(())
    }

    /// Total zero bytes emitted through `pad`
    pub fn padded_bytes(&self) -> u64 {
        self.padded_bytes
    }
}
