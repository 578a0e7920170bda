//! JSON-RPC API Layer
//!
//! Exposes the prompt service (submit, batch, session status/close) as
//! JSON-RPC 2.0 over localhost TCP.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig, RpcServerError};
