// src/capture/program.rs

//! The runnable command tree that an [`ExecutionWrapper`] drives.
//!
//! [`Program`] is the minimal surface the wrapper needs. [`ClapProgram`]
//! adapts a `clap::Command` plus a handler closure to it.
//!
//! [`ExecutionWrapper`]: crate::capture::ExecutionWrapper

use std::io::{self, Write};

use clap::error::ErrorKind;
use clap::{ArgMatches, Command};
use tokio_util::sync::CancellationToken;

use crate::capture::sink::SharedSink;

/// A command tree that can be re-run with fresh arguments.
pub trait Program: Send {
    /// Argument vector for the next `run`, without the binary name.
    fn set_args(&mut self, args: Vec<String>);

    /// Where the program's own output API writes.
    fn set_output(&mut self, sink: SharedSink);

    /// Cancellation context visible to the running program.
    fn set_context(&mut self, ctx: CancellationToken);

    /// Run to completion with the current arguments.
    fn run(&mut self) -> anyhow::Result<()>;
}

/// Per-run view handed to a [`ClapProgram`] handler.
///
/// Implements `Write`, so `writeln!(inv, ...)` goes to the program's output
/// sink (or real stdout when none is set).
pub struct Invocation<'a> {
    out: &'a mut dyn Write,
    ctx: &'a CancellationToken,
}

impl<'a> Invocation<'a> {
    pub fn out(&mut self) -> &mut dyn Write {
        self.out
    }

    pub fn context(&self) -> &CancellationToken {
        self.ctx
    }
}

impl Write for Invocation<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

type Handler = Box<dyn FnMut(&ArgMatches, &mut Invocation<'_>) -> anyhow::Result<()> + Send>;

/// A `clap::Command` tree plus the function that acts on its matches.
pub struct ClapProgram {
    command: Command,
    handler: Handler,
    args: Vec<String>,
    output: Option<SharedSink>,
    ctx: CancellationToken,
}

impl ClapProgram {
    pub fn new<F>(command: Command, handler: F) -> Self
    where
        F: FnMut(&ArgMatches, &mut Invocation<'_>) -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            command,
            handler: Box::new(handler),
            args: Vec::new(),
            output: None,
            ctx: CancellationToken::new(),
        }
    }
}

impl Program for ClapProgram {
    fn set_args(&mut self, args: Vec<String>) {
        self.args = args;
    }

    fn set_output(&mut self, sink: SharedSink) {
        self.output = Some(sink);
    }

    fn set_context(&mut self, ctx: CancellationToken) {
        self.ctx = ctx;
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let mut stdout = io::stdout();
        let mut sink;
        let out: &mut dyn Write = match &self.output {
            Some(s) => {
                sink = s.clone();
                &mut sink
            }
            None => &mut stdout,
        };

        let matches = match self
            .command
            .clone()
            .no_binary_name(true)
            .try_get_matches_from(&self.args)
        {
            Ok(m) => m,
            Err(err) => {
                // Help and usage go to the program output, like any other text.
                write!(out, "{}", err.render())?;
                return match err.kind() {
                    ErrorKind::DisplayHelp
                    | ErrorKind::DisplayVersion
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => Ok(()),
                    _ => Err(err.into()),
                };
            }
        };

        let mut invocation = Invocation {
            out,
            ctx: &self.ctx,
        };
        (self.handler)(&matches, &mut invocation)
    }
}
