/// Core error types for Lyra
use thiserror::Error;

/// Result type alias using `LyraError`
pub type Result<T> = std::result::Result<T, LyraError>;

/// Core error type for Lyra
#[derive(Error, Debug)]
pub enum LyraError {
    /// Entity not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LyraError {
    /// Create a not-found error for a song
    pub fn song_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Song".to_string(),
            id: id.into(),
        }
    }

    /// Create a not-found error for a playlist
    pub fn playlist_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Playlist".to_string(),
            id: id.into(),
        }
    }
}
