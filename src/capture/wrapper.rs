// src/capture/wrapper.rs

//! One program, one lock, one capture window per call.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::capture::program::Program;
use crate::capture::redirect::StreamRedirector;
use crate::capture::sink::SharedSink;
use crate::errors::Result;

/// Everything the program wrote during one call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedOutput {
    pub text: String,
}

/// Result of one [`ExecutionWrapper::execute`] call.
///
/// The output is present even when the program failed.
#[derive(Debug)]
pub struct Execution {
    pub output: CapturedOutput,
    pub error: Option<anyhow::Error>,
}

impl Execution {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Split into the output and a `Result` carrying the program error.
    pub fn into_parts(self) -> (CapturedOutput, anyhow::Result<()>) {
        let outcome = match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        };
        (self.output, outcome)
    }
}

struct WrapperState<P> {
    program: P,
    default_ctx: CancellationToken,
}

/// Runs a [`Program`] with stdout/stderr and the program's own output all
/// captured into a single string.
///
/// Calls on one wrapper are serialized; the lock is released on every exit
/// path, including a panic inside the program.
pub struct ExecutionWrapper<P: Program> {
    state: Mutex<WrapperState<P>>,
    tee_to_original: bool,
}

impl<P: Program> ExecutionWrapper<P> {
    pub fn new(program: P) -> Self {
        Self::with_context(CancellationToken::new(), program)
    }

    /// Wrap `program` with `ctx` as its default context.
    pub fn with_context(ctx: CancellationToken, mut program: P) -> Self {
        program.set_context(ctx.clone());
        Self {
            state: Mutex::new(WrapperState {
                program,
                default_ctx: ctx,
            }),
            tee_to_original: false,
        }
    }

    /// Also copy captured bytes to the original stdout/stderr.
    pub fn tee_to_original(mut self, tee: bool) -> Self {
        self.tee_to_original = tee;
        self
    }

    pub fn execute(&self, args: Vec<String>) -> Result<Execution> {
        let mut state = self.state.lock();
        run_captured(&mut state.program, args, self.tee_to_original)
    }

    /// Like [`execute`](Self::execute), with `ctx` replacing the default
    /// context for this call only.
    pub fn execute_with_context(
        &self,
        ctx: CancellationToken,
        args: Vec<String>,
    ) -> Result<Execution> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        state.program.set_context(ctx);
        let restore = RestoreContext {
            program: &mut state.program,
            default_ctx: &state.default_ctx,
        };
        run_captured(&mut *restore.program, args, self.tee_to_original)
    }
}

/// Puts the default context back when the call ends, however it ends.
struct RestoreContext<'a, P: Program> {
    program: &'a mut P,
    default_ctx: &'a CancellationToken,
}

impl<P: Program> Drop for RestoreContext<'_, P> {
    fn drop(&mut self) {
        self.program.set_context(self.default_ctx.clone());
    }
}

fn run_captured<P: Program>(
    program: &mut P,
    args: Vec<String>,
    tee_to_original: bool,
) -> Result<Execution> {
    debug!(?args, "starting captured execution");

    let sink = SharedSink::new();
    let redirector = StreamRedirector::activate(&sink, tee_to_original)?;

    program.set_output(sink.clone());
    program.set_args(args);
    let outcome = program.run();

    let drained = redirector.deactivate();

    debug!(
        drained,
        captured = sink.len(),
        success = outcome.is_ok(),
        "captured execution finished"
    );

    Ok(Execution {
        output: CapturedOutput {
            text: sink.snapshot(),
        },
        error: outcome.err(),
    })
}
