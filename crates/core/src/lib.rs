// Procman Core - Domain, Ports & Channel Pooling
// NO process spawning, NO transport code (adapters implement the ports)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
