//! Acquisition configuration
//!
//! `AcquisitionConfig` is the loose, user-facing form (TOML file or CLI
//! flags). `validate` resolves it into a `ValidatedConfig` before any
//! resource is touched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Per-page budget applied when none is configured
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

const TCP_PREFIX: &str = "tcp:";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No path parameter specified")]
    MissingPath,

    #[error("No format parameter specified")]
    MissingFormat,

    #[error("Invalid format {0:?} (expected raw, lime or padded)")]
    UnknownFormat(String),

    #[error("Invalid TCP port in {0:?}")]
    InvalidPort(String),

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// On-wire layout of the acquired image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// Range bytes back to back
    Raw,
    /// A `RangeHeader` before every range
    #[serde(alias = "structured")]
    Lime,
    /// Zero-filled gaps between ranges
    #[serde(alias = "zero_padded")]
    Padded,
}

impl FromStr for WireFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(Self::Raw),
            "lime" | "structured" => Ok(Self::Lime),
            "padded" | "zero_padded" => Ok(Self::Padded),
            _ => Err(ConfigError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Raw => "raw",
            Self::Lime => "lime",
            Self::Padded => "padded",
        })
    }
}

/// Where acquired bytes go
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Destination {
    Disk(PathBuf),
    Tcp(u16),
}

impl Destination {
    /// Parse a path parameter: `tcp:<port>` or a filesystem path
    pub fn parse(path: &str) -> Result<Self, ConfigError> {
        if path.is_empty() {
            return Err(ConfigError::MissingPath);
        }

        match path.strip_prefix(TCP_PREFIX) {
            Some(port) => port
                .trim()
                .parse::<u16>()
                .map(Self::Tcp)
                .map_err(|_| ConfigError::InvalidPort(path.to_string())),
            None => Ok(Self::Disk(PathBuf::from(path))),
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Tcp(_))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disk(path) => write!(f, "{}", path.display()),
            Self::Tcp(port) => write!(f, "{TCP_PREFIX}{port}"),
        }
    }
}

/// User-facing acquisition parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[allow(clippy::struct_excessive_bools)]
pub struct AcquisitionConfig {
    /// Output file path, or `tcp:<port>` to serve the image to one client
    pub path: Option<String>,
    /// Wire format name (raw, lime, padded)
    pub format: Option<String>,
    /// Attempt O_DIRECT|O_SYNC writes (disk only)
    pub direct_io: bool,
    /// Bind the listener to loopback only (network only)
    pub localhost_only: bool,
    /// Digest algorithm name (sha256, sha512, ...)
    pub digest: Option<String>,
    /// Compress the output stream with zlib
    pub compress: bool,
    /// Per-page wall-clock budget in milliseconds, 0 disables
    pub timeout_ms: Option<u64>,
    /// Emit zeros for the gap below the first range in padded mode
    pub pad_leading_gap: bool,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            path: None,
            format: None,
            direct_io: false,
            localhost_only: false,
            digest: None,
            compress: false,
            timeout_ms: Some(DEFAULT_TIMEOUT_MS),
            pad_leading_gap: false,
        }
    }
}

impl AcquisitionConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Resolve into an immutable, checked configuration
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        let path = self.path.as_deref().ok_or(ConfigError::MissingPath)?;
        let destination = Destination::parse(path)?;
        let wire_format = self
            .format
            .as_deref()
            .ok_or(ConfigError::MissingFormat)?
            .parse()?;

        let digest = self
            .digest
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        Ok(ValidatedConfig {
            direct_io: self.direct_io && !destination.is_network(),
            bind_local_only: self.localhost_only,
            destination,
            wire_format,
            digest,
            compress: self.compress,
            per_page_timeout: self
                .timeout_ms
                .filter(|&ms| ms > 0)
                .map(Duration::from_millis),
            pad_leading_gap: self.pad_leading_gap,
        })
    }
}

/// Checked configuration, immutable for the duration of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ValidatedConfig {
    pub destination: Destination,
    pub direct_io: bool,
    pub wire_format: WireFormat,
    pub bind_local_only: bool,
    pub digest: Option<String>,
    pub compress: bool,
    pub per_page_timeout: Option<Duration>,
    pub pad_leading_gap: bool,
}

impl ValidatedConfig {
    /// Minimal configuration for a disk destination
    pub fn disk<P: Into<PathBuf>>(path: P, wire_format: WireFormat) -> Self {
        Self {
            destination: Destination::Disk(path.into()),
            direct_io: false,
            wire_format,
            bind_local_only: false,
            digest: None,
            compress: false,
            per_page_timeout: None,
            pad_leading_gap: false,
        }
    }
}
