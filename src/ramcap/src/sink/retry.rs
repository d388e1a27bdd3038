//! Retrying writes
//!
//! Wraps a sink's `write` so interruption-class errors are retried
//! transparently. Everything else, including short writes, is returned to
//! the caller untouched.

use std::io::{self, ErrorKind, Write};

/// Which error kinds count as transient interruptions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    retryable: &'static [ErrorKind],
}

impl RetryPolicy {
    /// EINTR / EAGAIN equivalents
    pub const INTERRUPTIONS: Self = Self::new(&[ErrorKind::Interrupted, ErrorKind::WouldBlock]);

    /// Never retry
    pub const NONE: Self = Self::new(&[]);

    pub const fn new(retryable: &'static [ErrorKind]) -> Self {
        Self { retryable }
    }

    pub fn should_retry(&self, err: &io::Error) -> bool {
        self.retryable.contains(&err.kind())
    }

    /// One logical write, retried until it is accepted or fails hard
    pub fn write<W: Write + ?Sized>(&self, sink: &mut W, buf: &[u8]) -> io::Result<usize> {
        let mut attempts = 0u32;
        loop {
            match sink.write(buf) {
                Err(err) if self.should_retry(&err) => {
                    attempts += 1;
                    tracing::trace!(attempts, "write interrupted: {}", err);
                }
                result => return result,
            }
        }
    }

    /// Write the whole buffer, continuing after partial writes
    ///
    /// Used for small side-channel payloads where a short write is not a
    /// framing hazard.
    pub fn write_all<W: Write + ?Sized>(&self, sink: &mut W, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(sink, buf)? {
                0 => return Err(io::Error::from(ErrorKind::WriteZero)),
                n => buf = &buf[n..],
            }
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::INTERRUPTIONS
    }
}
