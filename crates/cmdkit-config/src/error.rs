use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be parsed
    #[error("Failed to parse config file {path}: {message}")]
    Parse {
        /// File that failed to parse
        path: PathBuf,
        /// Parser error message
        message: String,
    },

    /// The file extension does not map to a supported format
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(PathBuf),

    /// `validations_path` was set without `commands_path`
    #[error("\"commandsPath\" is required when \"validationsPath\" is set.")]
    ValidationsWithoutCommands,
}

/// Result alias for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
