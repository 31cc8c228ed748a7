//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use procman_core::application::TargetSummary;
use procman_core::domain::ProcessStatus;
use serde::{Deserialize, Serialize};

/// process.status.v1 / process.start.v1 / process.stop.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub target: String,
    pub process: String,
    /// Operator name substituted into `{user}` principals
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub target: String,
    pub process: String,
    pub success: bool,
    pub status: ProcessStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
    pub success: bool,
    pub message: String,
}

/// target.probe.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeRequest {
    pub target: String,
    #[serde(default)]
    pub user: Option<String>,
}

/// catalog.list.v1 (takes no parameters)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogListResponse {
    pub targets: Vec<TargetSummary>,
}
