//! Error types for playback

use lyra_core::LyraError;
use thiserror::Error;

/// Playback errors
///
/// Only resource and thread problems surface as errors. Rejected transport
/// operations are reported through [`crate::CommandOutcome`] instead.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No song is currently loaded
    #[error("No song loaded")]
    NoSongLoaded,

    /// Audio stream could not be opened
    #[error("Failed to open audio stream: {0}")]
    Resource(String),

    /// A frame could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Playback or analysis thread could not be started or stopped
    #[error("Thread lifecycle error: {0}")]
    ThreadLifecycle(String),

    /// Operation not allowed on this player
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Collaborator error
    #[error(transparent)]
    Core(#[from] LyraError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
