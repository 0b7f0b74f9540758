use thiserror::Error;

/// Errors produced by model constructors and parsing routines.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown severity: {0}")]
    UnknownSeverity(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
