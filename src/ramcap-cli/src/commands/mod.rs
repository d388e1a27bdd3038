//! Command handlers for the ramcap CLI
//!
//! Each subcommand has its own module with handler functions.

pub mod acquire;
pub mod inspect;
