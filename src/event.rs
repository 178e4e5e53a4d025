// src/event.rs

//! Invocation envelopes and the handler that replays them into a program.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::capture::{ExecutionWrapper, Program};
use crate::errors::{ClapLambdaError, Result};
use crate::rpc::server::{InvokeHandler, InvokeReply};

/// Argument vector to replay into the target program: `{"args": [...]}`.
///
/// A missing or `null` `args` is an empty argument vector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationEvent {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub args: Vec<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl InvocationEvent {
    pub fn new(args: Vec<String>) -> Self {
        Self { args }
    }

    pub fn from_json(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(ClapLambdaError::MalformedEvent)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Captured text as returned to callers: `{"stdout": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResult {
    pub stdout: String,
}

impl InvocationResult {
    pub fn from_json(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Outcome of handling one event. The result is present even when the
/// program failed.
#[derive(Debug)]
pub struct HandledEvent {
    pub result: InvocationResult,
    pub error: Option<anyhow::Error>,
}

/// Decodes events and runs them through an [`ExecutionWrapper`].
pub struct CaptureHandler<P: Program> {
    wrapper: Arc<ExecutionWrapper<P>>,
}

impl<P: Program> Clone for CaptureHandler<P> {
    fn clone(&self) -> Self {
        Self {
            wrapper: Arc::clone(&self.wrapper),
        }
    }
}

impl<P: Program> CaptureHandler<P> {
    pub fn new(program: P) -> Self {
        Self::from_wrapper(Arc::new(ExecutionWrapper::new(program)))
    }

    pub fn from_wrapper(wrapper: Arc<ExecutionWrapper<P>>) -> Self {
        Self { wrapper }
    }

    /// Decode `payload` and run it with `ctx` as the program context.
    ///
    /// A payload that is not an [`InvocationEvent`] fails before the program
    /// is touched.
    pub fn handle(&self, ctx: CancellationToken, payload: &[u8]) -> Result<HandledEvent> {
        let event = InvocationEvent::from_json(payload)?;
        let execution = self.wrapper.execute_with_context(ctx, event.args)?;
        Ok(HandledEvent {
            result: InvocationResult {
                stdout: execution.output.text,
            },
            error: execution.error,
        })
    }
}

impl<P: Program + 'static> InvokeHandler for CaptureHandler<P> {
    fn invoke(&self, ctx: CancellationToken, payload: Vec<u8>) -> InvokeReply {
        let handled = match self.handle(ctx, &payload) {
            Ok(handled) => handled,
            Err(e) => {
                warn!(error = %e, "invocation rejected");
                return InvokeReply {
                    payload: Vec::new(),
                    error: Some(e.to_string()),
                };
            }
        };

        let payload = match handled.result.to_json() {
            Ok(bytes) => bytes,
            Err(e) => {
                return InvokeReply {
                    payload: Vec::new(),
                    error: Some(e.to_string()),
                };
            }
        };

        InvokeReply {
            payload,
            error: handled.error.map(|e| format!("{e:#}")),
        }
    }
}
