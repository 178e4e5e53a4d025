// src/rpc/mod.rs

//! Local invoke protocol over TCP.
//!
//! - [`messages`]: wire records and newline-delimited JSON framing.
//! - [`client`]: [`InvocationClient`], the caller side.
//! - [`server`]: the endpoint a subordinate exposes on its advertised port.

pub mod client;
pub mod messages;
pub mod server;

pub use client::InvocationClient;
pub use messages::{InvokeRequest, InvokeResponse, SERVER_PORT_ENV, Timestamp};
pub use server::{InvokeHandler, InvokeReply, serve, serve_from_env};
