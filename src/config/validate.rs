// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile, RunnerSection};
use crate::errors::{ClapLambdaError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::ClapLambdaError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_runner(&raw.runner)?;
        Ok(ConfigFile::new_unchecked(raw.runner))
    }
}

fn validate_runner(runner: &RunnerSection) -> Result<()> {
    if runner.port == 0 {
        return Err(ClapLambdaError::ConfigError(
            "[runner].port must be a fixed port (got 0)".to_string(),
        ));
    }

    if runner.ready_poll_ms == 0 {
        return Err(ClapLambdaError::ConfigError(
            "[runner].ready_poll_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    if runner.ready_timeout_ms < runner.ready_poll_ms {
        return Err(ClapLambdaError::ConfigError(format!(
            "[runner].ready_timeout_ms ({}) must be >= ready_poll_ms ({})",
            runner.ready_timeout_ms, runner.ready_poll_ms
        )));
    }

    if runner.probe_timeout_ms == 0 {
        return Err(ClapLambdaError::ConfigError(
            "[runner].probe_timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    if runner.invoke_deadline_secs == 0 {
        return Err(ClapLambdaError::ConfigError(
            "[runner].invoke_deadline_secs must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}
