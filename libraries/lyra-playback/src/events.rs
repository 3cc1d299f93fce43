//! Player events
//!
//! Every event carries enough data for a surface to update without asking
//! the player anything:
//! - Transport changes (started/paused/stopped/finished)
//! - Song and playlist changes
//! - Position updates (periodic while playing)
//! - Advertisement breaks
//! - Spectrum bars for visualizers

use crate::types::RepeatMode;
use lyra_core::{Playlist, Song};
use serde::Serialize;

/// Events published on the [`crate::EventBus`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// A song became current
    SongLoaded { song: Song },

    /// Playback thread started (or resumed)
    PlaybackStarted,

    /// Playback paused, position retained
    PlaybackPaused,

    /// Playback stopped, position reset
    PlaybackStopped,

    /// Playback ran out of songs
    PlaybackFinished,

    /// Periodic position update while playing, and after every seek
    PlaybackProgress {
        frame: u64,
        ms: u64,
    },

    RepeatModeChanged { mode: RepeatMode },

    /// Playlist replaced; `None` when a single song replaced a playlist
    PlaylistLoaded { playlist: Option<Playlist> },

    /// Volume changed (dB)
    VolumeChanged { gain: f32 },

    /// Advertisement started
    AdOn { clip: Song },

    /// Advertisement finished or was interrupted
    AdOff,

    /// Smoothed spectrum bars with their peak caps
    SpectrumData { bars: Vec<f32>, peaks: Vec<f32> },

    /// Scrub preview while the position slider is held
    SliderDragging {
        frame: u64,
        ms: u64,
    },
}

/// Discriminant of [`PlayerEvent`], used for filtered subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SongLoaded,
    PlaybackStarted,
    PlaybackPaused,
    PlaybackStopped,
    PlaybackFinished,
    PlaybackProgress,
    RepeatModeChanged,
    PlaylistLoaded,
    VolumeChanged,
    AdOn,
    AdOff,
    SpectrumData,
    SliderDragging,
}

impl PlayerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SongLoaded { .. } => EventKind::SongLoaded,
            Self::PlaybackStarted => EventKind::PlaybackStarted,
            Self::PlaybackPaused => EventKind::PlaybackPaused,
            Self::PlaybackStopped => EventKind::PlaybackStopped,
            Self::PlaybackFinished => EventKind::PlaybackFinished,
            Self::PlaybackProgress { .. } => EventKind::PlaybackProgress,
            Self::RepeatModeChanged { .. } => EventKind::RepeatModeChanged,
            Self::PlaylistLoaded { .. } => EventKind::PlaylistLoaded,
            Self::VolumeChanged { .. } => EventKind::VolumeChanged,
            Self::AdOn { .. } => EventKind::AdOn,
            Self::AdOff => EventKind::AdOff,
            Self::SpectrumData { .. } => EventKind::SpectrumData,
            Self::SliderDragging { .. } => EventKind::SliderDragging,
        }
    }

    /// Position carried by progress and scrub events
    pub fn position(&self) -> Option<(u64, u64)> {
        match self {
            Self::PlaybackProgress { frame, ms } | Self::SliderDragging { frame, ms } => {
                Some((*frame, *ms))
            }
            _ => None,
        }
    }
}
