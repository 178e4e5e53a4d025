// src/lib.rs

pub mod capture;
pub mod cli;
pub mod config;
pub mod errors;
pub mod event;
pub mod logging;
pub mod rpc;
pub mod supervisor;

use std::io::Write;

use anyhow::{Result, anyhow};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, load_or_default};
use crate::errors::ClapLambdaError;
use crate::event::{InvocationEvent, InvocationResult};
use crate::rpc::Timestamp;
use crate::supervisor::{ReadyPolicy, SupervisedProcess, Supervisor, parse_args};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (+ `--port` override)
/// - launching the target in its own process group
/// - readiness polling and a single invocation
/// - graceful termination and final cleanup
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_or_default(args.config.as_deref())?.with_port(args.port)?;
    let command = parse_args(&args.target, args.mode())?;

    let supervisor = Supervisor::new(cfg.port());
    let mut process = supervisor.start(command)?;

    let outcome = drive(&mut process, &cfg).await;

    // Whatever happened above, the group must not outlive us.
    process.cleanup().await;
    outcome
}

/// Readiness, invocation, then SIGTERM and a verification ping.
async fn drive(process: &mut SupervisedProcess, cfg: &ConfigFile) -> Result<()> {
    let policy = ReadyPolicy {
        timeout: cfg.ready_timeout(),
        poll_interval: cfg.ready_poll(),
        probe_timeout: cfg.probe_timeout(),
    };
    process.wait_ready(policy).await?;
    info!(port = process.port(), "subprocess ready");

    let mut client = process.connect().await?;
    let event = InvocationEvent::new(process.config().program_args.clone());
    let deadline = Timestamp::from_now(cfg.invoke_deadline());

    match process.invoke(&mut client, event.to_json()?, deadline).await {
        Ok(payload) => {
            let result = InvocationResult::from_json(&payload)?;
            print_captured(&result.stdout)?;
        }
        Err(ClapLambdaError::RemoteApplicationError { message, payload }) => {
            if let Ok(result) = InvocationResult::from_json(&payload) {
                print_captured(&result.stdout)?;
            }
            return Err(anyhow!("function execution error: {message}"));
        }
        Err(e) => return Err(e.into()),
    }
    drop(client);

    if let Err(e) = process.terminate() {
        warn!(error = %e, "failed to send SIGTERM to subprocess group");
    }
    tokio::time::sleep(cfg.term_settle()).await;

    match rpc::client::ping(&rpc_addr(process.port())).await {
        Err(e) => debug!(error = %e, "ping after SIGTERM failed, as expected"),
        Ok(()) => warn!(
            port = process.port(),
            "subprocess still answered ping after SIGTERM"
        ),
    }

    Ok(())
}

fn print_captured(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn rpc_addr(port: u16) -> String {
    supervisor::ready::local_addr(port).to_string()
}
