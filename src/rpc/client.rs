// src/rpc/client.rs

//! Caller side of the invoke protocol.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;

use crate::errors::{ClapLambdaError, Result};
use crate::rpc::messages::{
    INVOKE_METHOD, InvokeRequest, InvokeResponse, PING_METHOD, PingRequest, PingResponse,
    RpcRequest, RpcResponse, Timestamp, read_frame, write_frame,
};

/// One connection to an invoke endpoint. Calls on it are sequential.
///
/// The client applies no timeout of its own: the deadline travels in the
/// request and the server enforces it.
#[derive(Debug)]
pub struct InvocationClient {
    addr: String,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_id: u64,
}

impl InvocationClient {
    pub async fn connect(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| ClapLambdaError::ConnectFailed {
                addr: addr.clone(),
                source,
            })?;
        debug!(%addr, "connected to invoke endpoint");

        let (reader, writer) = stream.into_split();
        Ok(Self {
            addr,
            reader: BufReader::new(reader),
            writer,
            next_id: 1,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send `payload` with `deadline` and wait for the reply.
    ///
    /// A remote-reported failure comes back as
    /// [`ClapLambdaError::RemoteApplicationError`] carrying whatever payload
    /// the remote produced; everything else is a transport error.
    pub async fn invoke(&mut self, payload: Vec<u8>, deadline: Timestamp) -> Result<Vec<u8>> {
        let response: InvokeResponse = self
            .call(INVOKE_METHOD, &InvokeRequest { payload, deadline })
            .await?;

        match response.error {
            Some(err) => Err(ClapLambdaError::RemoteApplicationError {
                message: err.message,
                payload: response.payload,
            }),
            None => Ok(response.payload),
        }
    }

    /// Liveness probe. Failing is expected once the remote has exited.
    pub async fn ping(&mut self) -> Result<()> {
        let _: PingResponse = self.call(PING_METHOD, &PingRequest {}).await?;
        Ok(())
    }

    async fn call<P, R>(&mut self, method: &str, params: &P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_id;
        self.next_id += 1;

        let request = RpcRequest {
            id,
            method: method.to_string(),
            params: serde_json::to_value(params)?,
        };
        write_frame(&mut self.writer, &request).await?;

        let response: RpcResponse = read_frame(&mut self.reader)
            .await?
            .ok_or_else(|| ClapLambdaError::Protocol("connection closed by server".to_string()))?;

        if response.id != id {
            return Err(ClapLambdaError::Protocol(format!(
                "response id {} does not match request id {id}",
                response.id
            )));
        }
        if let Some(err) = response.error {
            return Err(ClapLambdaError::Protocol(format!("{method}: {err}")));
        }

        serde_json::from_value(response.result)
            .map_err(|e| ClapLambdaError::Protocol(format!("{method}: invalid result: {e}")))
    }
}

/// Connect to `addr`, invoke once, and drop the connection.
pub async fn invoke(addr: &str, payload: Vec<u8>, deadline: Timestamp) -> Result<Vec<u8>> {
    InvocationClient::connect(addr)
        .await?
        .invoke(payload, deadline)
        .await
}

/// Connect to `addr` and ping once.
pub async fn ping(addr: &str) -> Result<()> {
    InvocationClient::connect(addr).await?.ping().await
}
