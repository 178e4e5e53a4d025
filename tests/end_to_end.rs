// tests/end_to_end.rs
//
// Drives the real `echo-function` binary through the supervisor and the
// invoke protocol, then the `clap-lambda` runner on top of both.

use std::process::Command;
use std::time::Duration;

use clap_lambda::errors::ClapLambdaError;
use clap_lambda::event::{InvocationEvent, InvocationResult};
use clap_lambda::rpc::Timestamp;
use clap_lambda::rpc::client::ping;
use clap_lambda::supervisor::{
    ProcessState, ReadyPolicy, RunMode, SupervisedProcess, Supervisor, parse_args,
};
use clap_lambda_test_utils::{free_port, init_tracing, with_timeout};

const ECHO_FUNCTION: &str = env!("CARGO_BIN_EXE_echo-function");
const RUNNER: &str = env!("CARGO_BIN_EXE_clap-lambda");

async fn start_echo_function() -> SupervisedProcess {
    init_tracing();
    let config = parse_args(&[ECHO_FUNCTION.to_string()], RunMode::Binary).unwrap();
    let mut process = Supervisor::new(free_port()).start(config).unwrap();
    process.wait_ready(ReadyPolicy::default()).await.unwrap();
    assert_eq!(process.state(), ProcessState::Ready);
    process
}

fn event(args: &[&str]) -> Vec<u8> {
    InvocationEvent::new(args.iter().map(|s| s.to_string()).collect())
        .to_json()
        .unwrap()
}

fn deadline() -> Timestamp {
    Timestamp::from_now(Duration::from_secs(10))
}

#[tokio::test]
async fn process_subcommand_echoes_its_value() {
    let mut process = start_echo_function().await;
    let mut client = process.connect().await.unwrap();

    let payload = with_timeout(process.invoke(
        &mut client,
        event(&["process", "--value", "x"]),
        deadline(),
    ))
    .await
    .unwrap();

    let result = InvocationResult::from_json(&payload).unwrap();
    assert_eq!(
        result,
        InvocationResult {
            stdout: "Processing: x\n".to_string()
        }
    );
    assert_eq!(process.state(), ProcessState::Invoked);

    process.cleanup().await;
}

#[tokio::test]
async fn one_process_serves_several_invocations() {
    let mut process = start_echo_function().await;
    let mut client = process.connect().await.unwrap();

    let first = process
        .invoke(&mut client, event(&["process", "--value", "a", "b", "--c"]), deadline())
        .await
        .unwrap();
    let second = process
        .invoke(&mut client, event(&["greet", "--name", "Lambda"]), deadline())
        .await
        .unwrap();

    let first = InvocationResult::from_json(&first).unwrap().stdout;
    assert_eq!(first, "Processing: a\nArg 0: b\nArg 1: --c\n");

    let second = InvocationResult::from_json(&second).unwrap().stdout;
    let hello = second.find("Hello, Lambda!").unwrap();
    let done = second.find("Command executed successfully").unwrap();
    assert!(hello < done);

    assert_eq!(process.invocations(), 2);
    process.cleanup().await;
}

#[tokio::test]
async fn failing_command_returns_error_and_partial_output() {
    let mut process = start_echo_function().await;
    let mut client = process.connect().await.unwrap();

    let err = process
        .invoke(&mut client, event(&["fail"]), deadline())
        .await
        .unwrap_err();

    assert!(!err.is_transport());
    match err {
        ClapLambdaError::RemoteApplicationError { message, payload } => {
            assert_eq!(message, "command execution failed");
            let result = InvocationResult::from_json(&payload).unwrap();
            assert!(result.stdout.contains("About to fail"));
        }
        other => panic!("expected RemoteApplicationError, got {other:?}"),
    }

    process.cleanup().await;
}

#[tokio::test]
async fn malformed_event_is_reported_by_the_function() {
    let mut process = start_echo_function().await;
    let mut client = process.connect().await.unwrap();

    let err = process
        .invoke(&mut client, br#"{"args":"process"}"#.to_vec(), deadline())
        .await
        .unwrap_err();

    match err {
        ClapLambdaError::RemoteApplicationError { message, payload } => {
            assert!(message.starts_with("malformed event"), "got {message:?}");
            assert!(payload.is_empty());
        }
        other => panic!("expected RemoteApplicationError, got {other:?}"),
    }

    process.cleanup().await;
}

#[tokio::test]
async fn null_args_event_is_served() {
    let mut process = start_echo_function().await;
    let mut client = process.connect().await.unwrap();

    // No subcommand: the command tree prints its help and succeeds.
    let payload = process
        .invoke(&mut client, br#"{"args":null}"#.to_vec(), deadline())
        .await
        .unwrap();

    let result = InvocationResult::from_json(&payload).unwrap();
    assert!(result.stdout.contains("Usage:"), "got {:?}", result.stdout);

    process.cleanup().await;
}

#[tokio::test]
async fn ping_after_sigterm_fails() {
    let mut process = start_echo_function().await;
    let addr = format!("127.0.0.1:{}", process.port());

    ping(&addr).await.unwrap();

    process.terminate().unwrap();
    assert_eq!(process.state(), ProcessState::Terminating);
    tokio::time::sleep(Duration::from_millis(500)).await;

    let err = ping(&addr).await.unwrap_err();
    assert!(err.is_transport(), "unexpected error kind: {err:?}");

    process.cleanup().await;
    assert_eq!(process.state(), ProcessState::Terminated);
}

fn run_runner(args: &[&str]) -> std::process::Output {
    let port = free_port().to_string();
    Command::new(RUNNER)
        .args(["--log-level", "warn", "--port", &port, ECHO_FUNCTION])
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn runner_prints_captured_output() {
    let output = run_runner(&["process", "--value", "x"]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Processing: x\n");
}

#[test]
fn runner_reports_function_failure_with_partial_output() {
    let output = run_runner(&["fail"]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("About to fail"), "stdout: {stdout}");
    assert!(
        stderr.contains("function execution error: command execution failed"),
        "stderr: {stderr}"
    );
}

#[test]
fn runner_without_target_fails() {
    let output = Command::new(RUNNER).output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing target path argument"), "stderr: {stderr}");
}

#[test]
fn runner_with_missing_binary_fails() {
    let output = Command::new(RUNNER)
        .arg("/definitely/not/a/function")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("target not found"), "stderr: {stderr}");
}
