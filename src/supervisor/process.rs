// src/supervisor/process.rs

//! Spawning, signaling and tearing down one subordinate process.

use std::fmt;

use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::{Pid, getpgid};
use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::errors::{ClapLambdaError, Result};
use crate::rpc::client::InvocationClient;
use crate::rpc::messages::Timestamp;
use crate::supervisor::command::{CommandConfig, build_command};
use crate::supervisor::ready::{ReadyPolicy, local_addr, wait_ready_with};

/// Lifecycle of a [`SupervisedProcess`].
///
/// `Created -> Started -> Ready -> Invoked -> Terminating -> Terminated`;
/// `Terminated` is reachable from anywhere through cleanup and is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Created,
    Started,
    Ready,
    Invoked,
    Terminating,
    Terminated,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessState::Created => "created",
            ProcessState::Started => "started",
            ProcessState::Ready => "ready",
            ProcessState::Invoked => "invoked",
            ProcessState::Terminating => "terminating",
            ProcessState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Starts subordinates on a fixed advertised port.
#[derive(Debug, Clone, Copy)]
pub struct Supervisor {
    port: u16,
}

impl Supervisor {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Launch `config` in a new process group.
    pub fn start(&self, config: CommandConfig) -> Result<SupervisedProcess> {
        let mut process = SupervisedProcess {
            config,
            child: None,
            pid: None,
            pgid: None,
            port: self.port,
            state: ProcessState::Created,
            invocations: 0,
        };

        let mut cmd = build_command(&process.config, self.port)?;
        let child = cmd.spawn().map_err(ClapLambdaError::SpawnFailed)?;

        let pid = child.id();
        let pgid = pid.map(|raw| {
            let pid = Pid::from_raw(raw as i32);
            // The child leads its own group, so pgid == pid if the lookup races.
            getpgid(Some(pid)).unwrap_or(pid)
        });

        info!(
            path = %process.config.program_path,
            mode = ?process.config.mode,
            pid,
            pgid = pgid.map(Pid::as_raw),
            port = self.port,
            "subprocess started"
        );

        process.child = Some(child);
        process.pid = pid;
        process.pgid = pgid;
        process.state = ProcessState::Started;
        Ok(process)
    }
}

/// One spawned subordinate. Dropping it kills the whole group if cleanup
/// has not run.
#[derive(Debug)]
pub struct SupervisedProcess {
    config: CommandConfig,
    child: Option<Child>,
    pid: Option<u32>,
    pgid: Option<Pid>,
    port: u16,
    state: ProcessState,
    invocations: u32,
}

impl SupervisedProcess {
    pub fn config(&self) -> &CommandConfig {
        &self.config
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn pgid(&self) -> Option<i32> {
        self.pgid.map(Pid::as_raw)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn invocations(&self) -> u32 {
        self.invocations
    }

    /// Block until the advertised port accepts connections.
    pub async fn wait_ready(&mut self, policy: ReadyPolicy) -> Result<()> {
        match self.state {
            ProcessState::Started | ProcessState::Ready => {}
            state => return Err(invalid(state, "wait for readiness")),
        }
        wait_ready_with(self.port, policy).await?;
        self.state = ProcessState::Ready;
        Ok(())
    }

    /// Open an invoke connection. Refused until a readiness probe passed.
    pub async fn connect(&self) -> Result<InvocationClient> {
        match self.state {
            ProcessState::Ready | ProcessState::Invoked => {}
            ProcessState::Created | ProcessState::Started => {
                return Err(ClapLambdaError::NotReady(self.port));
            }
            state => return Err(invalid(state, "connect")),
        }
        InvocationClient::connect(local_addr(self.port).to_string()).await
    }

    /// Invoke through `client`, recording the transition to `Invoked`.
    pub async fn invoke(
        &mut self,
        client: &mut InvocationClient,
        payload: Vec<u8>,
        deadline: Timestamp,
    ) -> Result<Vec<u8>> {
        match self.state {
            ProcessState::Ready | ProcessState::Invoked => {}
            ProcessState::Created | ProcessState::Started => {
                return Err(ClapLambdaError::NotReady(self.port));
            }
            state => return Err(invalid(state, "invoke")),
        }
        self.state = ProcessState::Invoked;
        self.invocations += 1;
        debug!(port = self.port, invocation = self.invocations, "invoking");
        client.invoke(payload, deadline).await
    }

    /// Deliver `signal` to every process in the subordinate's group.
    pub fn signal_group(&self, signal: Signal) -> Result<()> {
        if self.state == ProcessState::Terminated {
            return Err(invalid(self.state, "signal"));
        }
        let pgid = self
            .pgid
            .ok_or_else(|| invalid(self.state, "signal a process that never started"))?;

        debug!(pgid = pgid.as_raw(), %signal, "signaling process group");
        killpg(pgid, signal)?;
        Ok(())
    }

    /// Ask the group to shut down gracefully (SIGTERM).
    pub fn terminate(&mut self) -> Result<()> {
        self.signal_group(Signal::SIGTERM)?;
        self.state = ProcessState::Terminating;
        Ok(())
    }

    /// SIGKILL the group and reap the child.
    ///
    /// Errors from a group that is already gone are logged, not returned.
    pub async fn cleanup(&mut self) {
        if self.state == ProcessState::Terminated {
            return;
        }

        if let Some(pgid) = self.pgid {
            debug!(pgid = pgid.as_raw(), "cleaning up subprocess group");
            match killpg(pgid, Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => warn!(pgid = pgid.as_raw(), error = %e, "failed to kill process group"),
            }
        }

        if let Some(mut child) = self.child.take() {
            match child.wait().await {
                Ok(status) => debug!(pid = self.pid, %status, "subprocess exited"),
                Err(e) => debug!(pid = self.pid, error = %e, "waiting for subprocess failed"),
            }
        }

        self.state = ProcessState::Terminated;
    }
}

impl Drop for SupervisedProcess {
    fn drop(&mut self) {
        if self.state == ProcessState::Terminated {
            return;
        }
        if let Some(pgid) = self.pgid {
            let _ = killpg(pgid, Signal::SIGKILL);
        }
    }
}

fn invalid(state: ProcessState, action: &'static str) -> ClapLambdaError {
    ClapLambdaError::InvalidTransition {
        state: state.to_string(),
        action,
    }
}
