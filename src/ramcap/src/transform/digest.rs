//! Streaming digest over the logical image
//!
//! Hashes every byte handed to the output pipeline before compression, and
//! renders the result as lowercase hex for the side channel.

use serde::Serialize;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DigestError {
    #[error("Unsupported digest algorithm {0:?}")]
    Unsupported(String),
}

/// Supported hash algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Digest length in bytes
    pub fn output_len(self) -> usize {
        match self {
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|&c| c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "sha224" => Ok(Self::Sha224),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            _ => Err(DigestError::Unsupported(s.to_string())),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        })
    }
}

/// Running hash state
#[derive(Clone)]
pub enum DigestEngine {
    Sha224(Sha224),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl DigestEngine {
    pub fn init(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Sha224 => Self::Sha224(Sha224::new()),
            DigestAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            DigestAlgorithm::Sha384 => Self::Sha384(Sha384::new()),
            DigestAlgorithm::Sha512 => Self::Sha512(Sha512::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha224(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
            Self::Sha384(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
        }
    }

    /// Consume the state and render the digest as lowercase hex
    pub fn finalize_hex(self) -> String {
        match self {
            Self::Sha224(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha384(h) => hex::encode(h.finalize()),
            Self::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

/// Digest transform selected for a run
pub enum DigestStage {
    Disabled,
    Armed {
        name: String,
        engine: DigestEngine,
    },
    Failed {
        name: String,
        reason: String,
    },
}

impl DigestStage {
    /// Arm the digest for the configured algorithm name
    ///
    /// An unknown algorithm disables the digest for this run instead of
    /// failing it.
    pub fn arm(name: Option<&str>) -> Self {
        let Some(name) = name else {
            return Self::Disabled;
        };

        tracing::debug!("Initializing Digest Transformation.");
        match name.parse::<DigestAlgorithm>() {
            Ok(algorithm) => Self::Armed {
                name: name.to_string(),
                engine: DigestEngine::init(algorithm),
            },
            Err(err) => {
                tracing::warn!("Digest Initialization Failed: {}", err);
                Self::Failed {
                    name: name.to_string(),
                    reason: err.to_string(),
                }
            }
        }
    }

    pub fn is_armed(&self) -> bool {
        matches!(self, Self::Armed { .. })
    }

    pub fn update(&mut self, data: &[u8]) {
        if let Self::Armed { engine, .. } = self {
            engine.update(data);
        }
    }
}

/// What happened to the digest side channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DigestOutcome {
    Disabled,
    Written {
        algorithm: String,
        hex: String,
        destination: String,
    },
    Failed {
        algorithm: String,
        reason: String,
    },
}
