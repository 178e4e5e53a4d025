// src/supervisor/command.rs

//! Turning raw CLI tokens into a launchable subordinate command.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::errors::{ClapLambdaError, Result};
use crate::rpc::messages::SERVER_PORT_ENV;

/// How the target token is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// The target is an executable; run it directly.
    Binary,
    /// The target is a Cargo manifest; build and run it with `cargo run`.
    RunFromSource,
}

/// What to launch and with which forwarded arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandConfig {
    pub program_path: String,
    pub program_args: Vec<String>,
    pub mode: RunMode,
}

/// Interpret the tokens left after flag parsing.
///
/// The first token is the target; the rest are forwarded verbatim.
pub fn parse_args(raw: &[String], mode: RunMode) -> Result<CommandConfig> {
    debug!(?raw, ?mode, "parsing target arguments");

    let (target, rest) = raw.split_first().ok_or(ClapLambdaError::MissingTarget)?;

    if mode == RunMode::RunFromSource && !looks_like_manifest(target) {
        return Err(ClapLambdaError::InvalidSource(target.clone()));
    }

    Ok(CommandConfig {
        program_path: target.clone(),
        program_args: rest.to_vec(),
        mode,
    })
}

fn looks_like_manifest(target: &str) -> bool {
    Path::new(target)
        .file_name()
        .is_some_and(|name| name == "Cargo.toml")
}

/// Build the process for `config`, advertising `port` through
/// [`SERVER_PORT_ENV`] and placing it in its own process group.
///
/// The subordinate inherits stdout/stderr; the target must exist.
pub fn build_command(config: &CommandConfig, port: u16) -> Result<Command> {
    if !Path::new(&config.program_path).exists() {
        return Err(ClapLambdaError::TargetNotFound(config.program_path.clone()));
    }

    let mut cmd = match config.mode {
        RunMode::Binary => {
            let mut c = Command::new(&config.program_path);
            c.args(&config.program_args);
            c
        }
        RunMode::RunFromSource => {
            let mut c = Command::new("cargo");
            c.arg("run")
                .arg("--quiet")
                .arg("--manifest-path")
                .arg(&config.program_path)
                .arg("--")
                .args(&config.program_args);
            c
        }
    };

    // `cargo run` forks the real target; only a group signal reaches both.
    #[cfg(unix)]
    cmd.process_group(0);

    cmd.env(SERVER_PORT_ENV, port.to_string())
        .stdin(Stdio::null())
        .kill_on_drop(true);

    Ok(cmd)
}
