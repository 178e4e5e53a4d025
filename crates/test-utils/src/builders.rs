#![allow(dead_code)]

use clap_lambda::config::{ConfigFile, RawConfigFile, RunnerSection};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                runner: RunnerSection::default(),
            },
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.runner.port = port;
        self
    }

    pub fn ready_timeout_ms(mut self, ms: u64) -> Self {
        self.config.runner.ready_timeout_ms = ms;
        self
    }

    pub fn ready_poll_ms(mut self, ms: u64) -> Self {
        self.config.runner.ready_poll_ms = ms;
        self
    }

    pub fn probe_timeout_ms(mut self, ms: u64) -> Self {
        self.config.runner.probe_timeout_ms = ms;
        self
    }

    pub fn invoke_deadline_secs(mut self, secs: u64) -> Self {
        self.config.runner.invoke_deadline_secs = secs;
        self
    }

    pub fn term_settle_ms(mut self, ms: u64) -> Self {
        self.config.runner.term_settle_ms = ms;
        self
    }

    /// The raw, unvalidated file; for exercising validation failures.
    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
