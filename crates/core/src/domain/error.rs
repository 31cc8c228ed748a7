// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("Malformed process status: {0}")]
    MalformedStatus(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
