//! JSON-RPC Server
//!
//! Serves the command boundary over TCP on localhost.

use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use thiserror::Error;
use tracing::info;

use promptrelay_core::application::PromptService;

use crate::handler::RpcHandler;
use crate::types::{BatchRequest, ServiceRequest, SubmitRequest};

pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 9530;

#[derive(Error, Debug)]
pub enum RpcServerError {
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("Failed to register {method}: {reason}")]
    Register { method: &'static str, reason: String },
}

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, service: Arc<PromptService>) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(service)),
        }
    }

    fn module(&self) -> Result<RpcModule<()>, RpcServerError> {
        let mut module = RpcModule::new(());
        let register_err = |method: &'static str| {
            move |e: jsonrpsee::core::RegisterMethodError| RpcServerError::Register {
                method,
                reason: e.to_string(),
            }
        };

        let handler = self.handler.clone();
        module
            .register_async_method("prompt.submit.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: SubmitRequest = params.parse()?;
                    handler.submit(req).await
                }
            })
            .map_err(register_err("prompt.submit.v1"))?;

        let handler = self.handler.clone();
        module
            .register_async_method("prompt.batch.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: BatchRequest = params.parse()?;
                    handler.batch(req).await
                }
            })
            .map_err(register_err("prompt.batch.v1"))?;

        let handler = self.handler.clone();
        module
            .register_async_method("session.status.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ServiceRequest = params.parse()?;
                    handler.status(req).await
                }
            })
            .map_err(register_err("session.status.v1"))?;

        let handler = self.handler.clone();
        module
            .register_async_method("session.close.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ServiceRequest = params.parse()?;
                    handler.close(req).await
                }
            })
            .map_err(register_err("session.close.v1"))?;

        Ok(module)
    }

    /// Start the JSON-RPC server; returns its handle and bound address
    ///
    /// Security: binds to the configured host, 127.0.0.1 by default
    pub async fn start(self) -> Result<(ServerHandle, SocketAddr), RpcServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let bind_err = |e: std::io::Error| RpcServerError::Bind {
            addr: addr.clone(),
            reason: e.to_string(),
        };

        let server = Server::builder().build(&addr).await.map_err(bind_err)?;
        let local_addr = server.local_addr().map_err(bind_err)?;
        let module = self.module()?;

        info!(addr = %local_addr, "JSON-RPC server started");
        Ok((server.start(module), local_addr))
    }
}
