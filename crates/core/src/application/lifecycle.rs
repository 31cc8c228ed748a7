// Process lifecycle operations
//
// Status, start, stop and probe composed from channel invocations. Start and
// stop verify their effect with a second status query on the same channel;
// a verification that comes back wrong is a reported failure, never a retry.

use super::pool::{ChannelPool, PooledChannel};
use super::retry::{RetryPolicy, RetryingExecutor};
use super::settings::ManagerSettings;
use crate::domain::{
    ActionReport, ProcessDescriptor, ProcessStatus, ShellDialect, StatusReport, TargetDescriptor,
};
use crate::port::ChannelError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Entry point for every process operation
pub struct ProcessManager {
    pool: Arc<ChannelPool>,
    executor: RetryingExecutor,
    settle_interval: Duration,
}

impl ProcessManager {
    /// Create a manager over an existing pool
    ///
    /// # Arguments
    /// * `pool` - Channel pool shared with the sweeper
    /// * `settings` - Retry count, retry delay and settle interval
    pub fn new(pool: Arc<ChannelPool>, settings: &ManagerSettings) -> Self {
        let policy = RetryPolicy::new(settings.max_attempts, settings.retry_delay());
        Self {
            executor: RetryingExecutor::new(Arc::clone(&pool), policy),
            pool,
            settle_interval: settings.settle_interval(),
        }
    }

    pub fn pool(&self) -> &Arc<ChannelPool> {
        &self.pool
    }

    /// Query the state of the named process on `target`
    #[instrument(skip(self, target), fields(host = %target.host))]
    pub async fn get_status(&self, target: &TargetDescriptor, name: &str) -> StatusReport {
        if let Err(e) = target.validate() {
            return StatusReport::unavailable(e.to_string());
        }

        let dialect = target.shell;
        let result = self
            .executor
            .execute(target, move |channel| async move {
                query_status(&channel, dialect, name).await
            })
            .await;

        match result {
            Ok(status) => StatusReport::observed(status),
            Err(exhausted) => {
                warn!(process = %name, error = %exhausted, "Status query failed");
                StatusReport::unavailable(exhausted.to_string())
            }
        }
    }

    /// Start a process and verify that it runs
    #[instrument(skip(self, target, process), fields(host = %target.host, process = %process.name()))]
    pub async fn start(&self, target: &TargetDescriptor, process: &ProcessDescriptor) -> ActionReport {
        if let Err(e) = target.validate().and_then(|_| process.validate()) {
            return ActionReport::failed(e.to_string());
        }

        let dialect = target.shell;
        let settle = self.settle_interval;
        let result = self
            .executor
            .execute(target, move |channel| async move {
                let name = process.name();
                if query_status(&channel, dialect, name).await?.running {
                    return Ok(ActionReport::succeeded(format!(
                        "Process {} is already running",
                        name
                    )));
                }

                channel.invoke(process.start_command()).await?;
                settle_wait(settle).await;

                if query_status(&channel, dialect, name).await?.running {
                    Ok(ActionReport::succeeded(format!("Successfully started {}", name)))
                } else {
                    Ok(ActionReport::failed(format!("Failed to start {}", name)))
                }
            })
            .await;

        let report = result.unwrap_or_else(|exhausted| ActionReport::failed(exhausted.to_string()));
        info!(success = %report.success, message = %report.message, "Start finished");
        report
    }

    /// Stop a process and verify that it is gone
    #[instrument(skip(self, target, process), fields(host = %target.host, process = %process.name()))]
    pub async fn stop(&self, target: &TargetDescriptor, process: &ProcessDescriptor) -> ActionReport {
        if let Err(e) = target.validate().and_then(|_| process.validate()) {
            return ActionReport::failed(e.to_string());
        }

        let dialect = target.shell;
        let settle = self.settle_interval;
        let result = self
            .executor
            .execute(target, move |channel| async move {
                let name = process.name();
                if !query_status(&channel, dialect, name).await?.running {
                    return Ok(ActionReport::succeeded(format!(
                        "Process {} is not running",
                        name
                    )));
                }

                channel.invoke(process.stop_command()).await?;
                settle_wait(settle).await;

                if query_status(&channel, dialect, name).await?.running {
                    Ok(ActionReport::failed(format!("Failed to stop {}", name)))
                } else {
                    Ok(ActionReport::succeeded(format!("Successfully stopped {}", name)))
                }
            })
            .await;

        let report = result.unwrap_or_else(|exhausted| ActionReport::failed(exhausted.to_string()));
        info!(success = %report.success, message = %report.message, "Stop finished");
        report
    }

    /// Check that a channel to `target` can be opened and used
    #[instrument(skip(self, target), fields(host = %target.host))]
    pub async fn probe(&self, target: &TargetDescriptor) -> ActionReport {
        if let Err(e) = target.validate() {
            return ActionReport::failed(e.to_string());
        }

        let script = target.shell.probe_script();
        let result = self
            .executor
            .execute(target, move |channel| async move {
                let output = channel.invoke(script).await?;
                let hostname = output.stdout.trim();
                if hostname.is_empty() {
                    return Err(ChannelError::MalformedResponse(
                        "probe printed no host name".to_string(),
                    ));
                }
                Ok(hostname.to_string())
            })
            .await;

        match result {
            Ok(hostname) => ActionReport::succeeded(format!("Successfully connected to {}", hostname)),
            Err(exhausted) => ActionReport::failed(exhausted.to_string()),
        }
    }

    /// Close every pooled channel
    pub async fn shutdown(&self) {
        info!("Shutting down process manager");
        self.pool.evict_all().await;
    }
}

/// One status round-trip; output that is not a status document is a fault
async fn query_status(
    channel: &PooledChannel,
    dialect: ShellDialect,
    name: &str,
) -> Result<ProcessStatus, ChannelError> {
    let output = channel.invoke(&dialect.status_script(name)).await?;
    ProcessStatus::parse(&output.stdout).map_err(|e| {
        let stderr = output.stderr.trim();
        if stderr.is_empty() {
            ChannelError::MalformedResponse(e.to_string())
        } else {
            ChannelError::MalformedResponse(format!("{} (stderr: {})", e, stderr))
        }
    })
}

async fn settle_wait(interval: Duration) {
    if !interval.is_zero() {
        tokio::time::sleep(interval).await;
    }
}
