//! Output pipeline: digest → compress → sink write
//!
//! Every byte of the image, including headers and zero padding, passes
//! through `OutputPipeline::write`. The digest sees the logical bytes; the
//! sink sees the compressed bytes when compression is on.

use crate::sink::RetryPolicy;
use crate::transform::{CompressStage, DeflateError, DigestStage};
use std::io::{self, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The sink accepted only part of an uncompressed buffer
    #[error("Short write: {written} of {expected} bytes")]
    Short { written: usize, expected: usize },

    /// The sink accepted only part of a compressed chunk
    #[error("Short write of compressed chunk: {written} of {expected} bytes")]
    ShortChunk { written: usize, expected: usize },

    #[error(transparent)]
    Deflate(#[from] DeflateError),

    /// Compressing a buffer failed after the compressor took `consumed` bytes
    #[error("Compressed write failed after {consumed} bytes: {source}")]
    Compressed {
        consumed: usize,
        #[source]
        source: Box<WriteError>,
    },
}

impl WriteError {
    /// Logical bytes absorbed into the output stream before the failure
    pub fn accepted(&self) -> usize {
        match self {
            Self::Short { written, .. } => *written,
            Self::Compressed { consumed, .. } => *consumed,
            _ => 0,
        }
    }
}

/// Ordered composition of the run's transforms over one sink
pub struct OutputPipeline<W> {
    sink: W,
    retry: RetryPolicy,
    digest: DigestStage,
    compress: CompressStage,
    logical_bytes: u64,
    wire_bytes: u64,
    unwritten_bytes: u64,
}

impl<W: Write> OutputPipeline<W> {
    pub fn new(sink: W, digest: DigestStage, compress: CompressStage) -> Self {
        Self {
            sink,
            retry: RetryPolicy::INTERRUPTIONS,
            digest,
            compress,
            logical_bytes: 0,
            wire_bytes: 0,
            unwritten_bytes: 0,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Whether page contents must be snapshotted before being written
    pub fn transforms_active(&self) -> bool {
        self.digest.is_armed() || self.compress.is_active()
    }

    /// Push one buffer through the pipeline
    ///
    /// Returns the number of logical bytes absorbed, which is always
    /// `buf.len()` on success. On failure `WriteError::accepted` tells how
    /// much of `buf` made it into the output stream.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, WriteError> {
        if buf.is_empty() {
            return Ok(0);
        }

        self.digest.update(buf);

        let Self {
            sink,
            retry,
            compress,
            logical_bytes,
            wire_bytes,
            unwritten_bytes,
            ..
        } = self;

        let result = match compress {
            CompressStage::Active(deflater) => {
                let before = deflater.total_in();
                deflater
                    .feed(buf, |chunk| write_chunk(*retry, sink, chunk, wire_bytes))
                    .map_err(|err| {
                        if let WriteError::ShortChunk { written, .. } = err {
                            deflater.release(written);
                        }
                        WriteError::Compressed {
                            consumed: (deflater.total_in() - before) as usize,
                            source: Box::new(err),
                        }
                    })
            }
            CompressStage::Disabled => {
                retry.write(sink, buf).map_err(WriteError::from).and_then(|written| {
                    *wire_bytes += written as u64;
                    if written == buf.len() {
                        Ok(())
                    } else {
                        Err(WriteError::Short {
                            written,
                            expected: buf.len(),
                        })
                    }
                })
            }
        };

        match result {
            Ok(()) => {
                *logical_bytes += buf.len() as u64;
                Ok(buf.len())
            }
            Err(err) => {
                let accepted = err.accepted();
                *logical_bytes += accepted as u64;
                *unwritten_bytes += (buf.len() - accepted) as u64;
                Err(err)
            }
        }
    }

    /// End the stream: drain the compressor and flush the sink
    pub fn flush(&mut self) -> Result<(), WriteError> {
        let Self {
            sink,
            retry,
            compress,
            wire_bytes,
            ..
        } = self;

        if let CompressStage::Active(deflater) = compress {
            deflater.finish(|chunk| write_chunk(*retry, sink, chunk, wire_bytes))?;
            tracing::debug!(
                "Deflate stream finished: {} -> {} bytes",
                deflater.total_in(),
                deflater.total_out()
            );
        }

        sink.flush()?;
        Ok(())
    }

    /// Bytes handed to `write` and accepted
    pub fn logical_bytes(&self) -> u64 {
        self.logical_bytes
    }

    /// Bytes accepted by the sink
    pub fn wire_bytes(&self) -> u64 {
        self.wire_bytes
    }

    /// Bytes the digest saw that never made it into the output stream
    pub fn unwritten_bytes(&self) -> u64 {
        self.unwritten_bytes
    }

    pub fn is_compressed(&self) -> bool {
        self.compress.is_active()
    }

    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    /// Release the transforms, returning the sink and the digest state
    pub fn into_parts(self) -> (W, DigestStage) {
        (self.sink, self.digest)
    }
}

fn write_chunk<W: Write>(
    retry: RetryPolicy,
    sink: &mut W,
    chunk: &[u8],
    wire_bytes: &mut u64,
) -> Result<(), WriteError> {
    let written = retry.write(sink, chunk)?;
    *wire_bytes += written as u64;
    if written != chunk.len() {
        return Err(WriteError::ShortChunk {
            written,
            expected: chunk.len(),
        });
    }
    Ok(())
}
