// src/bin/echo-function.rs

//! A small function binary for exercising `clap-lambda` end to end.
//!
//! It serves invocations on `_LAMBDA_SERVER_PORT`; each invocation runs the
//! command tree below with the event's arguments.

use std::io::Write;

use anyhow::bail;
use clap::{Arg, ArgAction, ArgMatches, Command};
use clap_lambda::capture::{ClapProgram, Invocation};
use clap_lambda::event::CaptureHandler;
use clap_lambda::{logging, rpc};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("echo-function error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    logging::init_subordinate_logging()?;
    let program = ClapProgram::new(command(), handle);
    rpc::serve_from_env(CaptureHandler::new(program)).await?;
    Ok(())
}

fn command() -> Command {
    Command::new("echo-function")
        .about("Echo arguments back through the captured output")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("process")
                .about("Print the value and every extra argument")
                .arg(
                    Arg::new("value")
                        .long("value")
                        .required(true)
                        .value_name("VALUE"),
                )
                .arg(
                    Arg::new("args")
                        .action(ArgAction::Append)
                        .num_args(0..)
                        .trailing_var_arg(true)
                        .allow_hyphen_values(true),
                ),
        )
        .subcommand(
            Command::new("greet")
                .about("Say hello")
                .arg(
                    Arg::new("name")
                        .long("name")
                        .default_value("Lambda")
                        .value_name("NAME"),
                ),
        )
        .subcommand(Command::new("fail").about("Print a line, then fail"))
}

fn handle(matches: &ArgMatches, inv: &mut Invocation<'_>) -> anyhow::Result<()> {
    match matches.subcommand() {
        Some(("process", sub)) => {
            let value = sub
                .get_one::<String>("value")
                .map(String::as_str)
                .unwrap_or_default();
            writeln!(inv, "Processing: {value}")?;
            let extra = sub.get_many::<String>("args").into_iter().flatten();
            for (i, arg) in extra.enumerate() {
                writeln!(inv, "Arg {i}: {arg}")?;
            }
            Ok(())
        }
        Some(("greet", sub)) => {
            let name = sub
                .get_one::<String>("name")
                .map(String::as_str)
                .unwrap_or("Lambda");
            writeln!(inv, "Hello, {name}!")?;
            // Plain stdout, not the program output: both land in the capture.
            println!("Command executed successfully");
            Ok(())
        }
        Some(("fail", _)) => {
            writeln!(inv, "About to fail")?;
            bail!("command execution failed")
        }
        _ => bail!("no subcommand given"),
    }
}
