//! Core playback types

use lyra_core::{ListenerId, Song};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerState {
    /// No playback thread running
    Stopped,

    /// Playback thread decoding and emitting progress
    Playing,

    /// Playback thread halted, position retained
    Paused,

    /// Advertisement clip occupies the transport
    AdPlaying,
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::AdPlaying => "ad playing",
        };
        f.write_str(name)
    }
}

/// Repeat mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    /// Stop after the last song
    #[default]
    NoRepeat,

    /// Wrap around the playlist in both directions
    RepeatAll,

    /// Replay the current song on completion and on `next`
    RepeatOne,
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoRepeat => "off",
            Self::RepeatAll => "all",
            Self::RepeatOne => "one",
        };
        f.write_str(name)
    }
}

impl FromStr for RepeatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "none" | "no_repeat" => Ok(Self::NoRepeat),
            "all" | "repeat_all" => Ok(Self::RepeatAll),
            "one" | "repeat_one" => Ok(Self::RepeatOne),
            other => Err(format!("unknown repeat mode '{other}' (expected off, all or one)")),
        }
    }
}

/// Point-in-time view of the playback session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// Song on the transport (the ad clip while an ad plays)
    pub song: Option<Song>,

    pub state: PlayerState,

    /// Current frame, always within `0..=song.total_frames`
    pub frame: u64,

    /// Elapsed time of `frame`
    pub elapsed_ms: u64,

    /// Volume in dB
    pub volume_db: f32,

    pub repeat: RepeatMode,

    pub ad_active: bool,

    /// Index of the current song in the caller's playlist
    pub playlist_position: Option<usize>,

    /// Number of songs in the loaded playlist (1 for a single song)
    pub playlist_len: usize,

    pub shuffle_active: bool,

    pub listener: ListenerId,
}
