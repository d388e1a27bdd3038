//! Structured-format range header
//!
//! Layout (little-endian, packed):
//!
//! | Offset | Size | Field    |
//! |--------|------|----------|
//! | 0      | 4    | magic    |
//! | 4      | 4    | version  |
//! | 8      | 8    | start    |
//! | 16     | 8    | end      |
//! | 24     | 8    | reserved |

use crate::source::MemoryRange;
use byteorder::{ByteOrder, LE};
use std::io::{self, Read, Seek, SeekFrom};
use thiserror::Error;

/// "LiME" when read as a little-endian u32
pub const LIME_MAGIC: u32 = 0x4C69_4D45;

pub const LIME_VERSION: u32 = 1;

/// Encoded header size
pub const HEADER_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Bad magic {found:#010x} at offset {offset:#x}")]
    BadMagic { offset: u64, found: u32 },

    #[error("Unsupported header version {found} at offset {offset:#x}")]
    BadVersion { offset: u64, found: u32 },

    #[error("Header at offset {offset:#x} has start {start:#x} after end {end:#x}")]
    InvertedRange { offset: u64, start: u64, end: u64 },

    #[error("Image truncated at offset {offset:#x}")]
    Truncated { offset: u64 },
}

/// Per-range header preceding range bytes in the structured format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeHeader {
    pub magic: u32,
    pub version: u32,
    pub start: u64,
    pub end: u64,
    pub reserved: [u8; 8],
}

impl RangeHeader {
    pub fn for_range(range: &MemoryRange) -> Self {
        Self {
            magic: LIME_MAGIC,
            version: LIME_VERSION,
            start: range.start,
            end: range.end,
            reserved: [0; 8],
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        LE::write_u32(&mut buf[0..4], self.magic);
        LE::write_u32(&mut buf[4..8], self.version);
        LE::write_u64(&mut buf[8..16], self.start);
        LE::write_u64(&mut buf[16..24], self.end);
        buf[24..32].copy_from_slice(&self.reserved);
        buf
    }

    /// Decode without validation
    pub fn decode(buf: &[u8; HEADER_LEN]) -> Self {
        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&buf[24..32]);
        Self {
            magic: LE::read_u32(&buf[0..4]),
            version: LE::read_u32(&buf[4..8]),
            start: LE::read_u64(&buf[8..16]),
            end: LE::read_u64(&buf[16..24]),
            reserved,
        }
    }

    /// Decode and check magic, version and bounds
    pub fn parse(buf: &[u8; HEADER_LEN], offset: u64) -> Result<Self, FormatError> {
        let header = Self::decode(buf);
        if header.magic != LIME_MAGIC {
            return Err(FormatError::BadMagic {
                offset,
                found: header.magic,
            });
        }
        if header.version != LIME_VERSION {
            return Err(FormatError::BadVersion {
                offset,
                found: header.version,
            });
        }
        header.range().ok_or(FormatError::InvertedRange {
            offset,
            start: header.start,
            end: header.end,
        })?;
        Ok(header)
    }

    pub fn range(&self) -> Option<MemoryRange> {
        MemoryRange::new(self.start, self.end)
    }
}

/// A header found while scanning an image, with the offset of its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannedRange {
    pub range: MemoryRange,
    pub payload_offset: u64,
}

/// Walk an uncompressed structured image and list its ranges
pub fn scan_structured<R: Read + Seek>(reader: &mut R) -> Result<Vec<ScannedRange>, FormatError> {
    let image_len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    let mut ranges = Vec::new();
    let mut offset = 0u64;

    while offset < image_len {
        if image_len - offset < HEADER_LEN as u64 {
            return Err(FormatError::Truncated { offset });
        }

        let mut buf = [0u8; HEADER_LEN];
        reader.read_exact(&mut buf)?;
        let header = RangeHeader::parse(&buf, offset)?;
        let range = MemoryRange {
            start: header.start,
            end: header.end,
        };

        let payload_offset = offset + HEADER_LEN as u64;
        let next = (range.end - range.start)
            .checked_add(1)
            .and_then(|len| payload_offset.checked_add(len))
            .filter(|&next| next <= image_len)
            .ok_or(FormatError::Truncated {
                offset: payload_offset,
            })?;

        ranges.push(ScannedRange {
            range,
            payload_offset,
        });
        offset = reader.seek(SeekFrom::Start(next))?;
    }

    Ok(ranges)
}
