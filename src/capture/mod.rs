// src/capture/mod.rs

//! In-process output capture.
//!
//! - [`sink`]: the shared byte buffer everything lands in.
//! - [`redirect`]: swapping fds 1/2 for pipes and draining them.
//! - [`program`]: the [`Program`] trait and its clap adapter.
//! - [`wrapper`]: [`ExecutionWrapper`], which ties the three together.

pub mod program;
pub mod redirect;
pub mod sink;
pub mod wrapper;

pub use program::{ClapProgram, Invocation, Program};
pub use redirect::{GlobalStreamSlot, StreamRedirector};
pub use sink::SharedSink;
pub use wrapper::{CapturedOutput, Execution, ExecutionWrapper};
