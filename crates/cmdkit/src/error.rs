//! Error types for the engine

use cmdkit_config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// A module root could not be listed
#[derive(Debug, Error)]
#[error("Failed to scan {path}: {message}")]
pub struct ScanError {
    pub path: PathBuf,
    pub message: String,
}

/// A single module could not be turned into an entry
///
/// Callers log these and skip the file; they never abort a build.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("no module registered for {0}")]
    NotFound(PathBuf),

    #[error("does not export \"{0}\"")]
    MissingExport(&'static str),

    #[error("does not export a function")]
    NotCallable,

    #[error("handler \"{0}\" is not registered")]
    UnknownHandler(String),

    #[error("invalid \"{field}\" export: {message}")]
    InvalidExport {
        field: &'static str,
        message: String,
    },
}

/// A remote platform call failed
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PlatformError {
    pub message: String,
    /// HTTP-like status reported by the platform, when there is one
    pub status: Option<u16>,
}

impl PlatformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// A user-authored handler or rule failed during dispatch
///
/// The engine never recovers from these; they go back to the platform's
/// listener result.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Validation failed while handling \"{command}\": {source}")]
    Validation {
        command: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Command \"{command}\" failed: {source}")]
    Command {
        command: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Handler for event \"{event}\" failed: {source}")]
    Event {
        event: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to reply to interaction: {0}")]
    Reply(#[from] PlatformError),
}

/// Errors surfaced by the orchestrator
#[derive(Debug, Error)]
pub enum KitError {
    #[error("\"client\" is required when instantiating CommandKit.")]
    MissingClient,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("Failed to fetch remote commands: {0}")]
    Platform(#[from] PlatformError),

    #[error("CommandKit is already initialized")]
    AlreadyInitialized,
}

pub type KitResult<T> = Result<T, KitError>;
