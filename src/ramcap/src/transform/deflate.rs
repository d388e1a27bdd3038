//! Streaming zlib compression into a fixed output buffer
//!
//! Output is handed out in whole buffer-sized chunks while input is being
//! fed; only the final chunk written by `finish` may be shorter.

use flate2::{Compress, Compression, FlushCompress, Status};
use thiserror::Error;

/// Size of the compression output buffer
pub const DEFLATE_CHUNK: usize = 4096;

#[derive(Error, Debug)]
pub enum DeflateError {
    #[error("Deflate error: {0}")]
    Stream(#[from] flate2::CompressError),

    #[error("Deflate made no progress")]
    Stalled,

    #[error("Deflate stream already finished")]
    Finished,

    #[error("Deflate output buffer must not be empty")]
    EmptyBuffer,
}

/// zlib stream with a fixed-size output buffer
pub struct Deflater {
    stream: Compress,
    out: Vec<u8>,
    filled: usize,
    finished: bool,
}

impl Deflater {
    /// Start a stream whose output chunks are `chunk_size` bytes
    pub fn begin(chunk_size: usize) -> Result<Self, DeflateError> {
        if chunk_size == 0 {
            return Err(DeflateError::EmptyBuffer);
        }

        Ok(Self {
            stream: Compress::new(Compression::default(), true),
            out: vec![0u8; chunk_size],
            filled: 0,
            finished: false,
        })
    }

    /// Compress all of `input`, calling `emit` for every full output chunk
    pub fn feed<E, F>(&mut self, input: &[u8], mut emit: F) -> Result<(), E>
    where
        F: FnMut(&[u8]) -> Result<(), E>,
        E: From<DeflateError>,
    {
        if self.finished {
            return Err(DeflateError::Finished.into());
        }

        let mut consumed = 0;
        while consumed < input.len() {
            let (read, produced, _) = self.step(&input[consumed..], FlushCompress::None)?;
            consumed += read;

            if self.filled == self.out.len() {
                emit(&self.out)?;
                self.filled = 0;
            } else if read == 0 && produced == 0 {
                return Err(DeflateError::Stalled.into());
            }
        }

        Ok(())
    }

    /// End the stream, emitting every remaining byte
    pub fn finish<E, F>(&mut self, mut emit: F) -> Result<(), E>
    where
        F: FnMut(&[u8]) -> Result<(), E>,
        E: From<DeflateError>,
    {
        if self.finished {
            return Err(DeflateError::Finished.into());
        }

        loop {
            let (_, produced, status) = self.step(&[], FlushCompress::Finish)?;

            if self.filled == self.out.len() {
                emit(&self.out)?;
                self.filled = 0;
            } else if status != Status::StreamEnd && produced == 0 {
                return Err(DeflateError::Stalled.into());
            }

            if status == Status::StreamEnd {
                break;
            }
        }

        if self.filled > 0 {
            emit(&self.out[..self.filled])?;
            self.filled = 0;
        }
        self.finished = true;

        Ok(())
    }

    /// Drop the first `n` bytes of a pending chunk the sink already took
    ///
    /// After a failed `emit` the chunk stays pending and is offered again
    /// on the next call; bytes released here are not offered twice.
    pub fn release(&mut self, n: usize) {
        let n = n.min(self.filled);
        self.out.copy_within(n..self.filled, 0);
        self.filled -= n;
    }

    /// Bytes consumed so far
    pub fn total_in(&self) -> u64 {
        self.stream.total_in()
    }

    /// Compressed bytes produced so far
    pub fn total_out(&self) -> u64 {
        self.stream.total_out()
    }

    fn step(
        &mut self,
        input: &[u8],
        flush: FlushCompress,
    ) -> Result<(usize, usize, Status), DeflateError> {
        let before_in = self.stream.total_in();
        let before_out = self.stream.total_out();

        let status = self
            .stream
            .compress(input, &mut self.out[self.filled..], flush)?;

        let read = (self.stream.total_in() - before_in) as usize;
        let produced = (self.stream.total_out() - before_out) as usize;
        self.filled += produced;

        Ok((read, produced, status))
    }
}
