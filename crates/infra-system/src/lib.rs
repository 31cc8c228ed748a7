// Procman Infrastructure - Channel Adapters
// Implements: ChannelConnector, RemoteChannel

pub mod connector;
pub mod local_channel;
pub mod shell;
pub mod ssh_channel;

pub use connector::{ConnectorSettings, ShellConnector};
pub use local_channel::LocalChannel;
pub use ssh_channel::SshChannel;
