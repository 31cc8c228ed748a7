// Results handed back to callers of the lifecycle operations
//
// Expected failures never surface as errors: callers always get one of these
// with a success flag and a human readable diagnostic.

use super::process::ProcessStatus;
use serde::{Deserialize, Serialize};

/// Outcome of a status query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub success: bool,
    pub status: ProcessStatus,
}

impl StatusReport {
    pub fn observed(status: ProcessStatus) -> Self {
        Self {
            success: true,
            status,
        }
    }

    /// Query could not be completed; `running` is reported as false
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            success: false,
            status: ProcessStatus::unavailable(error),
        }
    }
}

/// Outcome of start, stop and probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReport {
    pub success: bool,
    pub message: String,
}

impl ActionReport {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
