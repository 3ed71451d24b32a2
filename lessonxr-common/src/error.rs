//! Common error types for LessonXR

use thiserror::Error;

/// Common result type for LessonXR operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while bootstrapping shared configuration
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Configuration file could not be used
    #[error("Configuration error: {0}")]
    Config(String),
}
