//! peerlog CLI
//!
//! Offline companion to the collector: view exported log files through the same
//! filter engine the live collector uses, merge several exports into one, and manage
//! the TOML configuration shared with the collector.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use error::{CliError, Result};
pub use cli::{Cli, Commands, ConfigAction};
pub use config::{CliAppConfig, DisplayConfig};
