//! Error types for lessonxr-player
//!
//! Only initialization errors (`NotFound`, `IncompleteContent`) are fatal for a
//! playback attempt. Every other kind is captured into stage status, asset
//! descriptors or events and the pipeline keeps going.

use lessonxr_common::events::Stage;
use thiserror::Error;

/// Main error type for the player
#[derive(Error, Debug)]
pub enum Error {
    /// No lesson bundle could be resolved
    #[error("Lesson not found: {0}")]
    NotFound(String),

    /// Bundle resolved but has nothing playable
    #[error("Lesson has no playable content: {0}")]
    IncompleteContent(String),

    /// Environment or narration stage failed (recoverable)
    #[error("{stage} stage failed: {message}")]
    StageLoad { stage: Stage, message: String },

    /// One asset failed to load (recoverable)
    #[error("Asset {asset_id} failed: {message}")]
    AssetLoad { asset_id: String, message: String },

    /// Immersive session request rejected or failed (recoverable)
    #[error("Immersive session request failed: {0}")]
    SessionRequest(String),

    /// Capability query failed (absorbed by the detector)
    #[error("Capability query failed: {0}")]
    CapabilityQuery(String),

    /// Narration playback errors
    #[error("Playback error: {0}")]
    Playback(String),

    /// Fetching bytes for an asset or record failed
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Asset bytes could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid identifier or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// lessonxr-common errors
    #[error(transparent)]
    Common(#[from] lessonxr_common::Error),
}

impl Error {
    /// Whether this error halts the pipeline at `Init → Failed`
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::IncompleteContent(_))
    }
}

/// Convenience Result type using the player Error
pub type Result<T> = std::result::Result<T, Error>;
