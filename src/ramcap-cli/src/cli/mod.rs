//! CLI argument definitions for ramcap
//!
//! This module contains all clap-derived structs and enums for CLI parsing.

mod core;

pub use core::{AcquireArgs, Cli, Commands};
