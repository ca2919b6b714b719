//! rowscout CLI library
//!
//! Argument parsing, logging setup, output and command handlers for the
//! `rowscout` binary.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod handlers;
pub mod logging;
mod output;

pub use commands::{
    CheckPartsArgs, Cli, ColorArg, Commands, ConfigArgs, FindArgs, ModeArg, PartsArgs, ProbeArgs,
    SessionArgs, UploadArgs, ValidateArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{to_json, Reporter};
