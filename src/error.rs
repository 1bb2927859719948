//! Error types for preparar

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Optimizer got an empty parameter list")]
    EmptyParameters,

    #[error("Parameter count mismatch: optimizer bound to {bound}, step received {got}")]
    ParameterMismatch { bound: usize, got: usize },

    #[error("Target {target} out of range for {num_classes} classes")]
    TargetOutOfRange { target: usize, num_classes: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
