//! Song metadata as resolved by the metadata collaborator

use super::ids::SongId;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Where the compressed audio bytes of a song live
///
/// The engine only ever opens a readable stream from this; it never writes.
#[derive(Clone, PartialEq)]
pub enum AudioLocation {
    /// File on local disk
    File(PathBuf),

    /// Bytes already fetched into memory (e.g. by a network collaborator)
    Memory(Arc<[u8]>),
}

impl AudioLocation {
    /// Location backed by a file path
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Location backed by in-memory bytes
    pub fn memory(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::Memory(bytes.into())
    }

    /// File extension hint for format probing, if known
    pub fn extension(&self) -> Option<&str> {
        match self {
            Self::File(path) => path.extension().and_then(|e| e.to_str()),
            Self::Memory(_) => None,
        }
    }
}

impl fmt::Debug for AudioLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Memory(bytes) => write!(f, "Memory({} bytes)", bytes.len()),
        }
    }
}

/// Immutable song metadata
///
/// Playback position is tracked in frames. `frame_rate_per_ms` converts
/// between frames and milliseconds in both directions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Song {
    /// Unique song identifier
    pub id: SongId,

    /// Song title
    pub title: String,

    /// Artist display string
    pub artist: String,

    /// Total duration in milliseconds
    pub duration_ms: u64,

    /// Total number of compressed frames
    pub total_frames: u64,

    /// Frames per millisecond (`total_frames / duration_ms`)
    pub frame_rate_per_ms: f64,

    /// Readable audio byte stream
    #[serde(skip)]
    pub location: AudioLocation,
}

impl Song {
    /// Create song metadata, deriving the frame rate from frames and duration
    pub fn new(
        id: impl Into<SongId>,
        title: impl Into<String>,
        artist: impl Into<String>,
        duration_ms: u64,
        total_frames: u64,
        location: AudioLocation,
    ) -> Self {
        let frame_rate_per_ms = if duration_ms == 0 {
            0.0
        } else {
            total_frames as f64 / duration_ms as f64
        };

        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            duration_ms,
            total_frames,
            frame_rate_per_ms,
            location,
        }
    }

    /// Number of frames covering `ms` milliseconds
    pub fn frames_for_ms(&self, ms: u64) -> u64 {
        (ms as f64 * self.frame_rate_per_ms).round() as u64
    }

    /// Millisecond offset of `frame`
    pub fn ms_for_frame(&self, frame: u64) -> u64 {
        if self.frame_rate_per_ms <= 0.0 {
            return 0;
        }
        (frame as f64 / self.frame_rate_per_ms).round() as u64
    }

    /// Clamp a frame position into `0..=total_frames`
    pub fn clamp_frame(&self, frame: u64) -> u64 {
        frame.min(self.total_frames)
    }

    /// Whether `frame` counts as a completed listen
    ///
    /// `ratio` is the fraction of the song that must have been played,
    /// e.g. 0.95.
    pub fn is_finished_at(&self, frame: u64, ratio: f64) -> bool {
        frame as f64 >= ratio * self.total_frames as f64
    }
}
