//! Byte-stream transforms layered onto the write path
//!
//! Each transform is resolved once per run into a stage that is either
//! active or not; the hot path only matches on the stage.

pub mod deflate;
pub mod digest;

pub use deflate::{DeflateError, Deflater, DEFLATE_CHUNK};
pub use digest::{DigestAlgorithm, DigestEngine, DigestError, DigestOutcome, DigestStage};

/// Compression transform selected for a run
pub enum CompressStage {
    Disabled,
    Active(Deflater),
}

impl CompressStage {
    /// Start compression if requested
    ///
    /// Failure here is fatal to the run: nothing may be fed into a
    /// half-initialized stream.
    pub fn begin(enabled: bool, chunk_size: usize) -> Result<Self, DeflateError> {
        if !enabled {
            return Ok(Self::Disabled);
        }
        tracing::debug!("Initializing Deflate stream ({} byte chunks)", chunk_size);
        Ok(Self::Active(Deflater::begin(chunk_size)?))
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }
}
