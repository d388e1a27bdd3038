//! Byte sinks
//!
//! Where acquired bytes go: a file on disk or a single TCP client. Sinks are
//! plain `io::Write` implementors with two extra hooks for the end of a run.

mod disk;
mod network;
mod retry;

pub use disk::{select_write_mode, side_path, DiskSink, ProbeOutcome, WriteMode};
pub use network::NetworkSink;
pub use retry::RetryPolicy;

use crate::config::{Destination, ValidatedConfig};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Failed to accept a connection on {addr}: {source}")]
    Accept {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Sequential output stream for one acquisition run
pub trait ByteSink: Write {
    /// End the memory payload
    fn close(&mut self) -> io::Result<()>;

    /// Destination for the digest artifact, named with `suffix`
    fn digest_channel(&mut self, suffix: &str) -> io::Result<Box<dyn Write + '_>>;

    /// Human-readable destination for logs
    fn describe(&self) -> String;

    /// Human-readable destination of the digest artifact
    fn digest_destination(&self, _suffix: &str) -> String {
        self.describe()
    }

    /// Disk write mode, if the sink is a file
    fn write_mode(&self) -> Option<WriteMode> {
        None
    }
}

impl<S: ByteSink + ?Sized> ByteSink for &mut S {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }

    fn digest_channel(&mut self, suffix: &str) -> io::Result<Box<dyn Write + '_>> {
        (**self).digest_channel(suffix)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn digest_destination(&self, suffix: &str) -> String {
        (**self).digest_destination(suffix)
    }

    fn write_mode(&self) -> Option<WriteMode> {
        (**self).write_mode()
    }
}

/// A sink opened from configuration
pub enum Sink {
    Disk(DiskSink),
    Network(NetworkSink),
}

impl Sink {
    /// Open the configured destination
    ///
    /// For network destinations this blocks until a client connects.
    pub fn open(config: &ValidatedConfig) -> Result<Self, SinkError> {
        match &config.destination {
            Destination::Disk(path) => Ok(Self::Disk(DiskSink::create(path, config.direct_io)?)),
            Destination::Tcp(port) => Ok(Self::Network(NetworkSink::listen(
                *port,
                config.bind_local_only,
            )?)),
        }
    }

    fn inner(&mut self) -> &mut dyn ByteSink {
        match self {
            Self::Disk(sink) => sink,
            Self::Network(sink) => sink,
        }
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner().flush()
    }
}

impl ByteSink for Sink {
    fn close(&mut self) -> io::Result<()> {
        self.inner().close()
    }

    fn digest_channel(&mut self, suffix: &str) -> io::Result<Box<dyn Write + '_>> {
        match self {
            Self::Disk(sink) => sink.digest_channel(suffix),
            Self::Network(sink) => sink.digest_channel(suffix),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Disk(sink) => sink.describe(),
            Self::Network(sink) => sink.describe(),
        }
    }

    fn digest_destination(&self, suffix: &str) -> String {
        match self {
            Self::Disk(sink) => sink.digest_destination(suffix),
            Self::Network(sink) => sink.digest_destination(suffix),
        }
    }

    fn write_mode(&self) -> Option<WriteMode> {
        match self {
            Self::Disk(sink) => sink.write_mode(),
            Self::Network(_) => None,
        }
    }
}
