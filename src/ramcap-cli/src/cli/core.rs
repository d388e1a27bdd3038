//! Core CLI definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ramcap")]
#[command(about = "Physical memory acquisition", long_about = None)]
pub struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Acquire physical memory to a file or a single TCP client
    #[command(visible_alias = "a")]
    Acquire(AcquireArgs),

    /// List the ranges of an uncompressed lime image
    #[command(visible_alias = "i")]
    Inspect {
        /// Path to the image
        image: PathBuf,
    },
}

#[derive(Args)]
#[allow(clippy::struct_excessive_bools)]
pub struct AcquireArgs {
    /// Output file, or tcp:<port> to serve the image to one client
    pub path: Option<String>,

    /// Wire format: raw, lime (structured) or padded (zero_padded)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Attempt O_DIRECT|O_SYNC writes, falling back to buffered
    #[arg(long)]
    pub dio: bool,

    /// Listen on 127.0.0.1 only
    #[arg(long)]
    pub localhostonly: bool,

    /// Digest algorithm (sha224, sha256, sha384, sha512)
    #[arg(short, long)]
    pub digest: Option<String>,

    /// Compress the output with zlib
    #[arg(short, long)]
    pub compress: bool,

    /// Per-page time budget in milliseconds (0 disables)
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// In padded format, also zero-fill below the first range
    #[arg(long)]
    pub pad_leading_gap: bool,

    /// TOML file with acquisition settings; flags override it
    #[arg(long, env = "RAMCAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Memory device to read (defaults to /dev/mem)
    #[arg(long, conflicts_with = "image")]
    pub device: Option<PathBuf>,

    /// Read from a raw image (offset = physical address) instead of a device
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Range listing in /proc/iomem format (defaults to /proc/iomem, or the
    /// whole file with --image)
    #[arg(long)]
    pub iomem: Option<PathBuf>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}
