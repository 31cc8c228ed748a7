//! JSON-RPC Server
//!
//! Serves the process methods over HTTP on a local TCP port.

use crate::handler::RpcHandler;
use crate::types::{ProbeRequest, ProcessRequest};
use jsonrpsee::server::{RegisterMethodError, Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use procman_core::application::{Catalog, ProcessManager};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9527;

/// RPC Server Configuration (`[server]` table)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
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

#[derive(Error, Debug)]
pub enum RpcServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Failed to register method: {0}")]
    Register(#[from] RegisterMethodError),
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, manager: Arc<ProcessManager>, catalog: Arc<Catalog>) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(manager, catalog)),
        }
    }

    /// Bind and start serving
    ///
    /// Returns the bound address (useful with port 0) and the stop handle.
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), RpcServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|source| RpcServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = server.local_addr().map_err(|source| RpcServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

        let module = build_module(self.handler)?;
        let handle = server.start(module);

        info!(addr = %local_addr, "JSON-RPC server started");
        Ok((local_addr, handle))
    }
}

fn build_module(handler: Arc<RpcHandler>) -> Result<RpcModule<()>, RegisterMethodError> {
    let mut module = RpcModule::new(());

    let h = handler.clone();
    module.register_async_method("process.status.v1", move |params, _, _| {
        let handler = h.clone();
        async move {
            let req: ProcessRequest = params.parse()?;
            handler.status(req).await
        }
    })?;

    let h = handler.clone();
    module.register_async_method("process.start.v1", move |params, _, _| {
        let handler = h.clone();
        async move {
            let req: ProcessRequest = params.parse()?;
            handler.start(req).await
        }
    })?;

    let h = handler.clone();
    module.register_async_method("process.stop.v1", move |params, _, _| {
        let handler = h.clone();
        async move {
            let req: ProcessRequest = params.parse()?;
            handler.stop(req).await
        }
    })?;

    let h = handler.clone();
    module.register_async_method("target.probe.v1", move |params, _, _| {
        let handler = h.clone();
        async move {
            let req: ProbeRequest = params.parse()?;
            handler.probe(req).await
        }
    })?;

    let h = handler;
    module.register_method("catalog.list.v1", move |_, _, _| {
        Ok::<_, ErrorObjectOwned>(h.list())
    })?;

    Ok(module)
}
