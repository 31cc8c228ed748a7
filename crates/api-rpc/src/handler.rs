//! RPC Method Handlers
//!
//! Resolves catalog names, then delegates to the process manager. Catalog
//! failures become RPC errors; operation failures are reported in the result.

use crate::error::to_rpc_error;
use crate::types::{
    ActionResponse, CatalogListResponse, ProbeRequest, ProcessRequest, StatusResponse,
};
use jsonrpsee::types::ErrorObjectOwned;
use procman_core::application::{Catalog, ProcessManager};
use procman_core::domain::{ProcessDescriptor, TargetDescriptor};
use std::sync::Arc;
use tracing::debug;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    manager: Arc<ProcessManager>,
    catalog: Arc<Catalog>,
}

impl RpcHandler {
    pub fn new(manager: Arc<ProcessManager>, catalog: Arc<Catalog>) -> Self {
        Self { manager, catalog }
    }

    /// process.status.v1
    pub async fn status(&self, params: ProcessRequest) -> Result<StatusResponse, ErrorObjectOwned> {
        let (target, process) = self.resolve(&params)?;
        let report = self.manager.get_status(&target, process.name()).await;

        Ok(StatusResponse {
            target: params.target,
            process: process.name().to_string(),
            success: report.success,
            status: report.status,
        })
    }

    /// process.start.v1
    pub async fn start(&self, params: ProcessRequest) -> Result<ActionResponse, ErrorObjectOwned> {
        let (target, process) = self.resolve(&params)?;
        let report = self.manager.start(&target, &process).await;

        Ok(ActionResponse {
            target: params.target,
            process: Some(process.name().to_string()),
            success: report.success,
            message: report.message,
        })
    }

    /// process.stop.v1
    pub async fn stop(&self, params: ProcessRequest) -> Result<ActionResponse, ErrorObjectOwned> {
        let (target, process) = self.resolve(&params)?;
        let report = self.manager.stop(&target, &process).await;

        Ok(ActionResponse {
            target: params.target,
            process: Some(process.name().to_string()),
            success: report.success,
            message: report.message,
        })
    }

    /// target.probe.v1
    pub async fn probe(&self, params: ProbeRequest) -> Result<ActionResponse, ErrorObjectOwned> {
        let target = self
            .catalog
            .resolve_target(&params.target, params.user.as_deref())
            .map_err(to_rpc_error)?;
        let report = self.manager.probe(&target).await;

        Ok(ActionResponse {
            target: params.target,
            process: None,
            success: report.success,
            message: report.message,
        })
    }

    /// catalog.list.v1
    pub fn list(&self) -> CatalogListResponse {
        CatalogListResponse {
            targets: self.catalog.summaries(),
        }
    }

    fn resolve(
        &self,
        params: &ProcessRequest,
    ) -> Result<(TargetDescriptor, ProcessDescriptor), ErrorObjectOwned> {
        let target = self
            .catalog
            .resolve_target(&params.target, params.user.as_deref())
            .map_err(to_rpc_error)?;
        let process = self
            .catalog
            .resolve_process(&params.target, &params.process)
            .map_err(to_rpc_error)?;
        debug!(host = %target.host, process = %process.name(), "Resolved request");
        Ok((target, process))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::code;
    use procman_core::application::{ChannelPool, ManagerSettings};
    use procman_core::domain::ShellDialect;
    use procman_core::port::channel::mocks::{CommandEffect, MockConnector, MockHost};
    use procman_core::port::id_provider::mocks::SequentialIdProvider;
    use procman_core::port::time_provider::mocks::ManualTimeProvider;

    fn handler(host: &Arc<MockHost>) -> RpcHandler {
        let settings = ManagerSettings::immediate();
        let pool = ChannelPool::new(
            Arc::new(MockConnector::new(Arc::clone(host))),
            Arc::new(ManualTimeProvider::new(0)),
            Arc::new(SequentialIdProvider::default()),
            settings.session_timeout(),
        );
        let catalog: Catalog = serde_json::from_value(serde_json::json!({
            "lab": {
                "host": "lab-01",
                "principal": "{user}",
                "processes": {
                    "worker": { "start_command": "run worker", "stop_command": "halt worker" }
                }
            }
        }))
        .unwrap();
        RpcHandler::new(
            Arc::new(ProcessManager::new(Arc::new(pool), &settings)),
            Arc::new(catalog),
        )
    }

    fn request(target: &str, process: &str) -> ProcessRequest {
        ProcessRequest {
            target: target.to_string(),
            process: process.to_string(),
            user: Some("alice".to_string()),
        }
    }

    #[tokio::test]
    async fn test_start_then_status() {
        let host = MockHost::new();
        host.track("worker", ShellDialect::Posix);
        host.on_command(
            "run worker",
            CommandEffect::SetRunning {
                process: "worker".to_string(),
                running: true,
            },
        );
        let handler = handler(&host);

        let started = handler.start(request("lab", "worker")).await.unwrap();
        assert!(started.success);
        assert_eq!(started.message, "Successfully started worker");

        let status = handler.status(request("lab", "worker")).await.unwrap();
        assert!(status.success);
        assert!(status.status.running);
    }

    #[tokio::test]
    async fn test_unknown_process_is_not_found() {
        let host = MockHost::new();
        let handler = handler(&host);

        let err = handler.stop(request("lab", "ghost")).await.unwrap_err();
        assert_eq!(err.code(), code::NOT_FOUND);
        assert_eq!(host.opened(), 0);
    }

    #[tokio::test]
    async fn test_missing_user_is_validation_error() {
        let host = MockHost::new();
        let handler = handler(&host);

        let err = handler
            .probe(ProbeRequest {
                target: "lab".to_string(),
                user: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::VALIDATION_ERROR);
    }

    #[test]
    fn test_list() {
        let host = MockHost::new();
        let listing = handler(&host).list();
        assert_eq!(listing.targets.len(), 1);
        assert_eq!(listing.targets[0].processes, vec!["worker"]);
    }
}
