//! Error types for spectrum analysis

use thiserror::Error;

/// Spectrum analysis errors
#[derive(Debug, Error)]
pub enum SpectrumError {
    /// Configuration values are out of range
    #[error("Invalid spectrum configuration: {0}")]
    InvalidConfig(String),

    /// Worker thread could not be started
    #[error("Failed to spawn spectrum thread: {0}")]
    ThreadSpawn(String),
}

/// Result type for spectrum operations
pub type Result<T> = std::result::Result<T, SpectrumError>;
