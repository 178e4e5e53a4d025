// src/supervisor/mod.rs

//! Local process supervision.
//!
//! - [`command`]: target parsing and building the launch command.
//! - [`process`]: [`Supervisor`] / [`SupervisedProcess`], group signaling and
//!   cleanup.
//! - [`ready`]: readiness polling of the advertised port.

pub mod command;
pub mod process;
pub mod ready;

pub use command::{CommandConfig, RunMode, build_command, parse_args};
pub use process::{ProcessState, SupervisedProcess, Supervisor};
pub use ready::{ReadyPolicy, wait_ready, wait_ready_with};
