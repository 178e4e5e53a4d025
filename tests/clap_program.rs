// tests/clap_program.rs

use std::io::Write;

use clap::{Arg, ArgAction, Command};
use clap_lambda::capture::{ClapProgram, Program, SharedSink};
use tokio_util::sync::CancellationToken;

fn echo_program() -> ClapProgram {
    let command = Command::new("echo")
        .about("Echo words")
        .arg(Arg::new("upper").long("upper").action(ArgAction::SetTrue))
        .arg(Arg::new("words").num_args(0..).action(ArgAction::Append));

    ClapProgram::new(command, |matches, inv| {
        let words: Vec<String> = matches
            .get_many::<String>("words")
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        let mut line = words.join(" ");
        if matches.get_flag("upper") {
            line = line.to_uppercase();
        }
        writeln!(inv, "{line}")?;
        Ok(())
    })
}

fn run_with(program: &mut ClapProgram, args: &[&str]) -> (SharedSink, anyhow::Result<()>) {
    let sink = SharedSink::new();
    program.set_output(sink.clone());
    program.set_args(args.iter().map(|s| s.to_string()).collect());
    let result = program.run();
    (sink, result)
}

#[test]
fn args_are_parsed_without_a_binary_name() {
    let mut program = echo_program();
    let (sink, result) = run_with(&mut program, &["--upper", "hello", "world"]);
    result.unwrap();
    assert_eq!(sink.snapshot(), "HELLO WORLD\n");
}

#[test]
fn program_can_be_rerun_with_fresh_args() {
    let mut program = echo_program();

    let (first, r1) = run_with(&mut program, &["--upper", "one"]);
    let (second, r2) = run_with(&mut program, &["two"]);
    r1.unwrap();
    r2.unwrap();

    assert_eq!(first.snapshot(), "ONE\n");
    // No flag state leaks from the previous run.
    assert_eq!(second.snapshot(), "two\n");
}

#[test]
fn help_goes_to_program_output_and_is_not_an_error() {
    let mut program = echo_program();
    let (sink, result) = run_with(&mut program, &["--help"]);
    result.unwrap();

    let text = sink.snapshot();
    assert!(text.contains("Echo words"), "got {text:?}");
    assert!(text.contains("--upper"), "got {text:?}");
}

#[test]
fn usage_errors_are_written_and_returned() {
    let mut program = echo_program();
    let (sink, result) = run_with(&mut program, &["--no-such-flag"]);

    let err = result.unwrap_err();
    assert!(err.to_string().contains("--no-such-flag"));
    assert!(sink.snapshot().contains("--no-such-flag"));
}

#[test]
fn handler_sees_the_current_context() {
    let command = Command::new("ctx");
    let mut program = ClapProgram::new(command, |_, inv| {
        let cancelled = inv.context().is_cancelled();
        writeln!(inv.out(), "cancelled={cancelled}")?;
        Ok(())
    });

    let ctx = CancellationToken::new();
    ctx.cancel();
    program.set_context(ctx);

    let (sink, result) = run_with(&mut program, &[]);
    result.unwrap();
    assert_eq!(sink.snapshot(), "cancelled=true\n");
}
