// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::errors::{ClapLambdaError, Result};

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [runner]
/// port = 8001
/// ready_timeout_ms = 5000
/// ready_poll_ms = 50
/// probe_timeout_ms = 100
/// invoke_deadline_secs = 10
/// term_settle_ms = 500
/// ```
///
/// Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub runner: RunnerSection,
}

/// `[runner]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunnerSection {
    /// Port advertised to the subordinate through `_LAMBDA_SERVER_PORT`.
    #[serde(default = "default_port")]
    pub port: u16,

    /// How long to wait for the subordinate's endpoint to accept connections.
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,

    #[serde(default = "default_ready_poll_ms")]
    pub ready_poll_ms: u64,

    /// Per-attempt connect timeout while polling.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Deadline sent with the invoke request, relative to now.
    #[serde(default = "default_invoke_deadline_secs")]
    pub invoke_deadline_secs: u64,

    /// Pause between SIGTERM and the post-termination ping.
    #[serde(default = "default_term_settle_ms")]
    pub term_settle_ms: u64,
}

fn default_port() -> u16 {
    8001
}

fn default_ready_timeout_ms() -> u64 {
    5000
}

fn default_ready_poll_ms() -> u64 {
    50
}

fn default_probe_timeout_ms() -> u64 {
    100
}

fn default_invoke_deadline_secs() -> u64 {
    10
}

fn default_term_settle_ms() -> u64 {
    500
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            ready_timeout_ms: default_ready_timeout_ms(),
            ready_poll_ms: default_ready_poll_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            invoke_deadline_secs: default_invoke_deadline_secs(),
            term_settle_ms: default_term_settle_ms(),
        }
    }
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    runner: RunnerSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(runner: RunnerSection) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &RunnerSection {
        &self.runner
    }

    pub fn port(&self) -> u16 {
        self.runner.port
    }

    /// Replace the port (e.g. from `--port`). Zero is rejected, as in the file.
    pub fn with_port(mut self, port: Option<u16>) -> Result<Self> {
        match port {
            Some(0) => Err(ClapLambdaError::ConfigError(
                "--port must be a fixed port (got 0)".to_string(),
            )),
            Some(port) => {
                self.runner.port = port;
                Ok(self)
            }
            None => Ok(self),
        }
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.runner.ready_timeout_ms)
    }

    pub fn ready_poll(&self) -> Duration {
        Duration::from_millis(self.runner.ready_poll_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.runner.probe_timeout_ms)
    }

    pub fn invoke_deadline(&self) -> Duration {
        Duration::from_secs(self.runner.invoke_deadline_secs)
    }

    pub fn term_settle(&self) -> Duration {
        Duration::from_millis(self.runner.term_settle_ms)
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(RunnerSection::default())
    }
}
