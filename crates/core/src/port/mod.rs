// Port Layer - Interfaces for external dependencies

pub mod channel;
pub mod id_provider; // For deterministic testing
pub mod time_provider;

// Re-exports
pub use channel::{ChannelConnector, ChannelError, CommandOutput, RemoteChannel};
pub use id_provider::IdProvider;
pub use time_provider::TimeProvider;
