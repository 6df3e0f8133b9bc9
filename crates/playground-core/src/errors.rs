//! Error types for failure handling across the playground service
//!
//! The hierarchy splits into a general `PlaygroundError` used at the
//! pipeline and storage seams, and a `RunnerError` specific to container
//! invocation. Compile and run failures of *user code* are not errors at
//! all: they are ordinary `PipelineOutcome` variants. An `Err` anywhere in
//! this crate means the infrastructure itself misbehaved (daemon
//! unreachable, spawn failure, unreadable exchange directory), which the
//! HTTP layer reports as a gateway-class failure.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlaygroundError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Staging error: {0}")]
    StagingError(String),
    #[error("Container runner failed: {0}")]
    RunnerError(#[from] RunnerError),
    #[error("Saved-file storage error: {0}")]
    StorageError(String),
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for PlaygroundError {
    fn from(err: std::io::Error) -> Self {
        PlaygroundError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for PlaygroundError {
    fn from(err: serde_json::Error) -> Self {
        PlaygroundError::StorageError(err.to_string())
    }
}

// Specific error for container runners
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Bollard (Docker client) error: {0}")]
    BollardError(#[from] bollard::errors::Error),
    #[error("I/O error during container invocation: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Relay invocation failed: {0}")]
    RelayError(String),
    #[error("Could not resolve exit status from side file: {0}")]
    StatusFileError(String),
    #[error("Container wait stream ended without a status")]
    MissingExitStatus,
}
