// Domain Layer - Targets, processes and the reports handed back to callers

pub mod dialect;
pub mod error;
pub mod process;
pub mod report;
pub mod target;

// Re-exports
pub use dialect::ShellDialect;
pub use error::DomainError;
pub use process::{ProcessDescriptor, ProcessStatus};
pub use report::{ActionReport, StatusReport};
pub use target::{PoolKey, TargetDescriptor};
