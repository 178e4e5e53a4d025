// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::supervisor::RunMode;

const AFTER_HELP: &str = "\
The target is started with _LAMBDA_SERVER_PORT=<port> (default 8001) and invoked
over its local RPC endpoint. Its captured stdout is printed here.

Examples:
  # Run a compiled binary
  clap-lambda ./target/debug/my-function process --value x

  # Build and run from source
  clap-lambda --source -- ./my-function/Cargo.toml process --value x

  # Debug logging
  clap-lambda --debug ./target/debug/my-function";

/// Command-line arguments for `clap-lambda`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "clap-lambda",
    version,
    about = "Run a function binary locally and invoke it over its RPC endpoint.",
    long_about = None,
    after_help = AFTER_HELP
)]
pub struct CliArgs {
    /// Enable debug logging (same as `--log-level debug`).
    #[arg(long)]
    pub debug: bool,

    /// Treat the target as a Cargo manifest and launch it with `cargo run`.
    #[arg(long)]
    pub source: bool,

    /// Path to a runner config file (TOML). Defaults apply when omitted.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Port advertised to the target; overrides `[runner].port`.
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `--debug`, then `CLAP_LAMBDA_LOG`, then `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Target path followed by the arguments forwarded to it.
    #[arg(
        value_name = "TARGET",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub target: Vec<String>,
}

impl CliArgs {
    pub fn mode(&self) -> RunMode {
        if self.source {
            RunMode::RunFromSource
        } else {
            RunMode::Binary
        }
    }

    /// Effective log level: explicit flag first, then `--debug`.
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        self.log_level
            .or(if self.debug { Some(LogLevel::Debug) } else { None })
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
