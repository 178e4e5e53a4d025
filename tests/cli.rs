// tests/cli.rs

use clap::Parser;
use clap_lambda::cli::{CliArgs, LogLevel};
use clap_lambda::logging::parse_level_str;
use clap_lambda::supervisor::RunMode;

#[test]
fn target_and_forwarded_args_keep_their_hyphens() {
    let args = CliArgs::try_parse_from([
        "clap-lambda",
        "--port",
        "9001",
        "./fn",
        "process",
        "--value",
        "x",
        "--debug",
    ])
    .unwrap();

    assert_eq!(args.port, Some(9001));
    assert!(!args.debug, "flags after the target belong to the target");
    assert_eq!(args.target, ["./fn", "process", "--value", "x", "--debug"]);
    assert_eq!(args.mode(), RunMode::Binary);
}

#[test]
fn source_flag_selects_run_from_source() {
    let args = CliArgs::try_parse_from(["clap-lambda", "--source", "fn/Cargo.toml"]).unwrap();
    assert_eq!(args.mode(), RunMode::RunFromSource);
}

#[test]
fn no_target_still_parses() {
    let args = CliArgs::try_parse_from(["clap-lambda"]).unwrap();
    assert!(args.target.is_empty());
}

#[test]
fn explicit_log_level_beats_debug() {
    let args =
        CliArgs::try_parse_from(["clap-lambda", "--debug", "--log-level", "warn", "./fn"]).unwrap();
    assert_eq!(args.effective_log_level(), Some(LogLevel::Warn));

    let args = CliArgs::try_parse_from(["clap-lambda", "--debug", "./fn"]).unwrap();
    assert_eq!(args.effective_log_level(), Some(LogLevel::Debug));

    let args = CliArgs::try_parse_from(["clap-lambda", "./fn"]).unwrap();
    assert_eq!(args.effective_log_level(), None);
}

#[test]
fn level_strings_parse_case_insensitively() {
    assert_eq!(parse_level_str(" DEBUG "), Some(tracing::Level::DEBUG));
    assert_eq!(parse_level_str("warning"), Some(tracing::Level::WARN));
    assert_eq!(parse_level_str("loud"), None);
}
