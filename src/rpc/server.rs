// src/rpc/server.rs

//! Subordinate side of the invoke protocol: bind the advertised port, answer
//! `Function.Invoke` / `Function.Ping` until asked to shut down.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{ClapLambdaError, Result};
use crate::rpc::messages::{
    INVOKE_METHOD, InvokeRequest, InvokeResponse, PING_METHOD, PingResponse, RpcRequest,
    RpcResponse, SERVER_PORT_ENV, read_frame, write_frame,
};

/// What an invoke handler hands back: the payload plus an optional error
/// message. Both travel to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvokeReply {
    pub payload: Vec<u8>,
    pub error: Option<String>,
}

impl From<InvokeReply> for InvokeResponse {
    fn from(reply: InvokeReply) -> Self {
        match reply.error {
            Some(message) => InvokeResponse::failed(reply.payload, message),
            None => InvokeResponse::ok(reply.payload),
        }
    }
}

/// Synchronous handler for one invocation.
///
/// Runs on the blocking pool. `ctx` is cancelled if the request deadline
/// elapses first.
pub trait InvokeHandler: Send + Sync + 'static {
    fn invoke(&self, ctx: CancellationToken, payload: Vec<u8>) -> InvokeReply;
}

/// Read the port to bind from [`SERVER_PORT_ENV`].
pub fn port_from_env() -> Result<u16> {
    let raw = std::env::var(SERVER_PORT_ENV).map_err(|_| {
        ClapLambdaError::ConfigError(format!("{SERVER_PORT_ENV} is not set"))
    })?;
    raw.trim().parse().map_err(|_| {
        ClapLambdaError::ConfigError(format!("{SERVER_PORT_ENV} is not a valid port: {raw}"))
    })
}

pub async fn bind(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    Ok(TcpListener::bind(addr).await?)
}

/// Bind the port from the environment and serve until SIGTERM or Ctrl-C.
pub async fn serve_from_env<H: InvokeHandler>(handler: H) -> Result<()> {
    let port = port_from_env()?;
    let listener = bind(port).await?;
    info!(port, "invoke endpoint listening");
    serve(listener, Arc::new(handler), shutdown_signal()).await
}

/// Accept connections on `listener` until `shutdown` resolves.
pub async fn serve<H, S>(listener: TcpListener, handler: Arc<H>, shutdown: S) -> Result<()>
where
    H: InvokeHandler,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested; invoke endpoint stopping");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                debug!(%peer, "accepted connection");
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, handler).await {
                        debug!(%peer, error = %e, "connection ended with error");
                    }
                });
            }
        }
    }
}

async fn handle_connection<H: InvokeHandler>(stream: TcpStream, handler: Arc<H>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    while let Some(request) = read_frame::<_, RpcRequest>(&mut reader).await? {
        debug!(id = request.id, method = %request.method, "dispatching call");
        let response = dispatch(request, &handler).await;
        write_frame(&mut writer, &response).await?;
    }
    Ok(())
}

async fn dispatch<H: InvokeHandler>(request: RpcRequest, handler: &Arc<H>) -> RpcResponse {
    let id = request.id;
    let outcome = match request.method.as_str() {
        PING_METHOD => serde_json::to_value(PingResponse {}).map_err(|e| e.to_string()),
        INVOKE_METHOD => match serde_json::from_value::<InvokeRequest>(request.params) {
            Ok(invoke) => {
                let response = run_invoke(invoke, handler).await;
                serde_json::to_value(response).map_err(|e| e.to_string())
            }
            Err(e) => Err(format!("invalid params: {e}")),
        },
        other => Err(format!("unknown method: {other}")),
    };

    match outcome {
        Ok(result) => RpcResponse {
            id,
            result,
            error: None,
        },
        Err(error) => RpcResponse {
            id,
            result: serde_json::Value::Null,
            error: Some(error),
        },
    }
}

/// How long a cancelled handler gets to hand back its partial output.
const CANCEL_GRACE: Duration = Duration::from_millis(500);

async fn run_invoke<H: InvokeHandler>(request: InvokeRequest, handler: &Arc<H>) -> InvokeResponse {
    let Some(remaining) = request.deadline.remaining() else {
        warn!(deadline = request.deadline.seconds, "request arrived past its deadline");
        return InvokeResponse::failed(Vec::new(), "deadline exceeded");
    };

    let ctx = CancellationToken::new();
    let mut job = {
        let ctx = ctx.clone();
        let handler = Arc::clone(handler);
        tokio::task::spawn_blocking(move || handler.invoke(ctx, request.payload))
    };

    match tokio::time::timeout(remaining, &mut job).await {
        Ok(Ok(reply)) => reply.into(),
        Ok(Err(join_err)) => {
            warn!(error = %join_err, "invoke handler panicked");
            InvokeResponse::failed(Vec::new(), format!("handler panicked: {join_err}"))
        }
        Err(_) => {
            ctx.cancel();

            // Output written before the deadline still goes back to the caller.
            // Log only once the handler is done; its capture window may be open.
            let payload = match tokio::time::timeout(CANCEL_GRACE, job).await {
                Ok(Ok(reply)) => reply.payload,
                Ok(Err(join_err)) => {
                    warn!(error = %join_err, "invoke handler panicked after cancellation");
                    Vec::new()
                }
                Err(_) => {
                    warn!(grace = ?CANCEL_GRACE, "handler ignored cancellation; dropping its output");
                    Vec::new()
                }
            };
            warn!(?remaining, "invoke deadline elapsed; cancelled handler context");
            InvokeResponse::failed(payload, "deadline exceeded")
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
