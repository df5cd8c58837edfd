//! Cradle CLI library.
//!
//! Argument definitions, configuration and the subcommand implementations
//! behind the `cradle` binary.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, NurseAction, SleepAction, TrendMetric};
pub use config::Config;
