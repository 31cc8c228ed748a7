// Local channel: runs every invocation in a fresh local interpreter
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use procman_core::domain::ShellDialect;
use procman_core::port::{ChannelError, CommandOutput, RemoteChannel};

use crate::shell;

/// Channel onto the local machine
///
/// Holds no OS resources between invocations; close only marks it unusable.
pub struct LocalChannel {
    id: String,
    dialect: ShellDialect,
    invoke_timeout: Option<Duration>,
    closed: bool,
}

impl LocalChannel {
    pub fn new(id: impl Into<String>, dialect: ShellDialect) -> Self {
        Self {
            id: id.into(),
            dialect,
            invoke_timeout: None,
            closed: false,
        }
    }

    pub fn with_invoke_timeout(mut self, limit: Option<Duration>) -> Self {
        self.invoke_timeout = limit;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl RemoteChannel for LocalChannel {
    async fn invoke(&mut self, command: &str) -> Result<CommandOutput, ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }

        debug!(channel_id = %self.id, dialect = %self.dialect, "Invoking locally");
        shell::run_captured(shell::local_command(self.dialect, command), self.invoke_timeout).await
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        self.closed = true;
        info!(channel_id = %self.id, "Local channel closed");
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use procman_core::domain::ProcessStatus;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_invoke_echo() {
        let mut channel = LocalChannel::new("local-1", ShellDialect::Posix);
        let output = assert_ok!(channel.invoke("echo hello").await);
        assert!(output.succeeded());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_output() {
        let mut channel = LocalChannel::new("local-1", ShellDialect::Posix);
        let output = channel.invoke("exit 7").await.unwrap();
        assert_eq!(output.exit_code, Some(7));
    }

    #[tokio::test]
    async fn test_status_script_for_absent_process() {
        let mut channel = LocalChannel::new("local-1", ShellDialect::Posix);
        let script = ShellDialect::Posix.status_script("procman-no-such-process");
        let output = channel.invoke(&script).await.unwrap();
        let status = ProcessStatus::parse(&output.stdout).unwrap();
        assert!(!status.running);
    }

    #[tokio::test]
    async fn test_closed_channel_faults() {
        let mut channel = LocalChannel::new("local-1", ShellDialect::Posix);
        assert_ok!(channel.close().await);
        assert_eq!(channel.invoke("echo hello").await, Err(ChannelError::Closed));
    }
}
