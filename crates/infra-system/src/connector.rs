// Connector picking the local or SSH adapter per target
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use procman_core::domain::TargetDescriptor;
use procman_core::port::{ChannelConnector, ChannelError, IdProvider, RemoteChannel};

use crate::local_channel::LocalChannel;
use crate::ssh_channel::SshChannel;

const DEFAULT_INVOKE_TIMEOUT_MS: u64 = 60_000;

/// Transport tunables, read from the `[channel]` configuration table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorSettings {
    pub ssh_program: String,
    /// Directory for master sockets (system temp dir when unset)
    pub control_dir: Option<PathBuf>,
    pub connect_timeout_secs: u64,
    /// Upper bound for one invocation; expiry is a channel fault
    pub invoke_timeout_ms: u64,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            ssh_program: "ssh".to_string(),
            control_dir: None,
            connect_timeout_secs: 10,
            invoke_timeout_ms: DEFAULT_INVOKE_TIMEOUT_MS,
        }
    }
}

impl ConnectorSettings {
    pub fn control_dir(&self) -> PathBuf {
        self.control_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn invoke_timeout(&self) -> Duration {
        Duration::from_millis(self.invoke_timeout_ms)
    }
}

/// Opens `LocalChannel`s for the local machine and `SshChannel`s otherwise
pub struct ShellConnector {
    id_provider: Arc<dyn IdProvider>,
    settings: ConnectorSettings,
}

impl ShellConnector {
    pub fn new(id_provider: Arc<dyn IdProvider>, settings: ConnectorSettings) -> Self {
        Self {
            id_provider,
            settings,
        }
    }
}

#[async_trait]
impl ChannelConnector for ShellConnector {
    async fn open(&self, target: &TargetDescriptor) -> Result<Box<dyn RemoteChannel>, ChannelError> {
        let id = self.id_provider.generate_id();

        if target.is_local() {
            debug!(channel_id = %id, "Opening local channel");
            let channel = LocalChannel::new(id, target.shell)
                .with_invoke_timeout(Some(self.settings.invoke_timeout()));
            return Ok(Box::new(channel));
        }

        debug!(channel_id = %id, host = %target.host, "Opening SSH channel");
        let channel = SshChannel::open(target, id, &self.settings).await?;
        Ok(Box::new(channel))
    }
}
