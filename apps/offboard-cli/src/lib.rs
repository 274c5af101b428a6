//! Library half of the `offboard` binary.
//!
//! Configuration, setup, and output are exposed here so they can be tested
//! without spawning the binary.

pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod prompt;
pub mod setup;

pub use error::{CliError, CliResult};
