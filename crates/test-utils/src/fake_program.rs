use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use clap_lambda::capture::{Program, SharedSink};
use tokio_util::sync::CancellationToken;

type Script = Box<dyn FnMut(&[String], &mut SharedSink, &CancellationToken) -> anyhow::Result<()> + Send>;

/// A `Program` whose `run` is a closure.
///
/// The closure receives the current args, the program output sink (a fresh
/// detached one if the wrapper never set it), and the current context.
pub struct ScriptedProgram {
    script: Script,
    args: Vec<String>,
    output: Option<SharedSink>,
    ctx: CancellationToken,
    runs: Arc<AtomicUsize>,
}

impl ScriptedProgram {
    pub fn new<F>(script: F) -> Self
    where
        F: FnMut(&[String], &mut SharedSink, &CancellationToken) -> anyhow::Result<()>
            + Send
            + 'static,
    {
        Self {
            script: Box::new(script),
            args: Vec::new(),
            output: None,
            ctx: CancellationToken::new(),
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter of completed `run` calls.
    pub fn run_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.runs)
    }

    pub fn context(&self) -> &CancellationToken {
        &self.ctx
    }
}

impl Program for ScriptedProgram {
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
        let mut sink = self.output.clone().unwrap_or_default();
        let result = (self.script)(&self.args, &mut sink, &self.ctx);
        self.runs.fetch_add(1, Ordering::SeqCst);
        result
    }
}
