// src/logging.rs

//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (or `--debug`)
//! 2. `CLAP_LAMBDA_LOG` environment variable (e.g. "info", "debug")
//! 3. the caller's default
//!
//! Logs are sent to STDERR so that stdout carries only captured output.

use anyhow::Result;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "CLAP_LAMBDA_LOG";

/// Initialise the global subscriber for the runner binary.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let level = match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => level_from_env().unwrap_or(tracing::Level::INFO),
    };
    install(level)
}

/// Initialise logging for a subordinate serving invocations.
///
/// Defaults to `warn`: anything logged from another thread while a capture
/// window is open lands in the captured output.
pub fn init_subordinate_logging() -> Result<()> {
    install(level_from_env().unwrap_or(tracing::Level::WARN))
}

fn install(level: tracing::Level) -> Result<()> {
    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}

fn level_from_env() -> Option<tracing::Level> {
    std::env::var(LOG_ENV)
        .ok()
        .and_then(|s| parse_level_str(&s))
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

pub fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
