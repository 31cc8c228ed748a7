//! JSON-RPC API Layer
//!
//! Exposes process status, start, stop, probe and the target catalog as
//! JSON-RPC 2.0 methods.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use jsonrpsee::server::ServerHandle;
pub use server::{RpcServer, RpcServerConfig, RpcServerError};
