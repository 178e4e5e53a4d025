// src/errors.rs

//! Crate-wide error type and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClapLambdaError {
    #[error("missing target path argument")]
    MissingTarget,

    #[error("invalid source target: {0} (expected a Cargo.toml manifest)")]
    InvalidSource(String),

    #[error("target not found at {0}")]
    TargetNotFound(String),

    #[error("failed to start subprocess: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("timeout waiting for server on port {port} after {waited_ms}ms")]
    ReadinessTimeout { port: u16, waited_ms: u128 },

    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}")]
    RemoteApplicationError { message: String, payload: Vec<u8> },

    #[error("failed to set up output capture: {0}")]
    PipeSetupFailed(String),

    #[error("output streams are already redirected by another capture")]
    StreamsBusy,

    #[error("malformed event: {0}")]
    MalformedEvent(#[source] serde_json::Error),

    #[error("process is {state}, cannot {action}")]
    InvalidTransition { state: String, action: &'static str },

    #[error("server on port {0} has not passed a readiness probe yet")]
    NotReady(u16),

    #[error("signal delivery failed: {0}")]
    Signal(#[from] nix::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClapLambdaError {
    /// True when the call never reached the target program ("could not invoke"),
    /// as opposed to the program running and reporting failure.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClapLambdaError::ConnectFailed { .. }
                | ClapLambdaError::Protocol(_)
                | ClapLambdaError::IoError(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ClapLambdaError>;
