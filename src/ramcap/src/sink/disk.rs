//! Disk sink
//!
//! Sequential file output with an optional direct-I/O mode. Direct I/O is
//! probed by opening the path with `O_DIRECT|O_SYNC` and writing a small
//! marker; filesystems that refuse it fall back to buffered writes.

use super::{ByteSink, SinkError};
use serde::Serialize;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// Marker written while probing direct I/O support
const PROBE_MARKER: &[u8] = b"DIO";

#[cfg(target_os = "linux")]
const DIRECT_FLAGS: i32 = libc::O_DIRECT | libc::O_SYNC;
#[cfg(not(target_os = "linux"))]
const DIRECT_FLAGS: i32 = libc::O_SYNC;

/// How the output file is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    Direct,
    Buffered,
}

/// Result of the direct-I/O capability probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    NotAttempted,
    Accepted,
    Rejected,
}

/// Decide the write mode from the request and the probe result
pub fn select_write_mode(requested: bool, probe: ProbeOutcome) -> WriteMode {
    match (requested, probe) {
        (true, ProbeOutcome::Accepted) => WriteMode::Direct,
        _ => WriteMode::Buffered,
    }
}

fn open_options(mode: WriteMode) -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    if mode == WriteMode::Direct {
        options.custom_flags(DIRECT_FLAGS);
    }
    options
}

/// Try a direct-I/O open and a marker write at `path`
fn probe_direct(path: &Path) -> ProbeOutcome {
    let accepted = open_options(WriteMode::Direct)
        .open(path)
        .and_then(|mut file| file.write(PROBE_MARKER))
        .map(|n| n == PROBE_MARKER.len());

    match accepted {
        Ok(true) => ProbeOutcome::Accepted,
        Ok(false) => ProbeOutcome::Rejected,
        Err(err) => {
            tracing::debug!("Direct IO probe failed: {}", err);
            ProbeOutcome::Rejected
        }
    }
}

/// Append `.{suffix}` to a path without replacing its extension
pub fn side_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// File-backed byte sink
pub struct DiskSink {
    path: PathBuf,
    file: Option<File>,
    mode: WriteMode,
}

impl DiskSink {
    /// Create (truncating) the output file
    pub fn create<P: AsRef<Path>>(path: P, direct_io: bool) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();

        let probe = if direct_io {
            probe_direct(&path)
        } else {
            ProbeOutcome::NotAttempted
        };
        let mode = select_write_mode(direct_io, probe);
        if direct_io && mode == WriteMode::Buffered {
            tracing::warn!("Direct IO Disabled for {}", path.display());
        }

        let file = open_options(mode)
            .open(&path)
            .map_err(|source| SinkError::Open {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            file: Some(file),
            mode,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    fn file(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "disk sink is closed"))
    }
}

impl Write for DiskSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file()?.flush()
    }
}

impl ByteSink for DiskSink {
    fn close(&mut self) -> io::Result<()> {
        match self.file.take() {
            Some(file) => file.sync_all(),
            None => Ok(()),
        }
    }

    fn digest_channel(&mut self, suffix: &str) -> io::Result<Box<dyn Write + '_>> {
        let path = side_path(&self.path, suffix);
        let side = DiskSink::create(&path, false).map_err(io::Error::other)?;
        Ok(Box::new(side))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn digest_destination(&self, suffix: &str) -> String {
        side_path(&self.path, suffix).display().to_string()
    }

    fn write_mode(&self) -> Option<WriteMode> {
        Some(self.mode)
    }
}
