// Application Layer - Pooling, Retry and Process Lifecycle

pub mod catalog;
pub mod constants;
pub mod lifecycle;
pub mod pool;
pub mod retry;
pub mod settings;
pub mod sweeper;

// Re-exports
pub use catalog::{Catalog, ProcessEntry, TargetEntry, TargetSummary};
pub use lifecycle::ProcessManager;
pub use pool::{ChannelPool, CloseFault, PooledChannel};
pub use retry::{RetriesExhausted, RetryDecision, RetryPolicy, RetryingExecutor};
pub use settings::ManagerSettings;
pub use sweeper::{sweep_signal, PoolSweeper, SweepSignal, SweepStop};
