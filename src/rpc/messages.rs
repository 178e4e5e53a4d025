// src/rpc/messages.rs

//! Wire records for the local invoke protocol and their line framing.
//!
//! Every frame is one JSON object followed by `\n`:
//!
//! ```text
//! -> {"id":1,"method":"Function.Invoke","params":{"payload":[...],"deadline":{"seconds":1700000000}}}
//! <- {"id":1,"result":{"payload":[...]}}
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::{ClapLambdaError, Result};

pub const INVOKE_METHOD: &str = "Function.Invoke";
pub const PING_METHOD: &str = "Function.Ping";

/// Environment variable carrying the port the subordinate must bind.
pub const SERVER_PORT_ENV: &str = "_LAMBDA_SERVER_PORT";

/// Absolute point in time, seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    #[serde(default)]
    pub nanos: i64,
}

impl Timestamp {
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            seconds: since_epoch.as_secs() as i64,
            nanos: i64::from(since_epoch.subsec_nanos()),
        }
    }

    /// `now + after`.
    pub fn from_now(after: Duration) -> Self {
        let at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            + after;
        Self {
            seconds: at.as_secs() as i64,
            nanos: i64::from(at.subsec_nanos()),
        }
    }

    /// Time left until this deadline, or `None` if it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        let deadline = Duration::new(
            u64::try_from(self.seconds).ok()?,
            u32::try_from(self.nanos).unwrap_or(0),
        );
        let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
        deadline.checked_sub(now).filter(|d| !d.is_zero())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub payload: Vec<u8>,
    pub deadline: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeResponse {
    #[serde(default)]
    pub payload: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<InvokeResponseError>,
}

impl InvokeResponse {
    pub fn ok(payload: Vec<u8>) -> Self {
        Self {
            payload,
            error: None,
        }
    }

    pub fn failed(payload: Vec<u8>, message: impl Into<String>) -> Self {
        Self {
            payload,
            error: Some(InvokeResponseError {
                message: message.into(),
                error_type: String::new(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeResponseError {
    pub message: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub error_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingRequest {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResponse {}

/// Call envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Reply envelope. `error` is a dispatch-level failure (unknown method, bad
/// params), not an application error; those live in [`InvokeResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: u64,
    #[serde(default)]
    pub result: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn write_frame<W, T>(writer: &mut W, frame: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(frame)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame; `Ok(None)` on a clean end of stream.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    serde_json::from_str(line.trim_end())
        .map(Some)
        .map_err(|e| ClapLambdaError::Protocol(format!("invalid frame: {e}")))
}
