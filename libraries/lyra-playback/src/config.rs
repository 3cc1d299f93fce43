//! Player configuration

use crate::types::RepeatMode;
use serde::{Deserialize, Serialize};

#[cfg(feature = "spectrum")]
use lyra_spectrum::SpectrumConfig;

/// Player settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Commands kept for undo (default: 20)
    pub history_capacity: usize,

    /// Starting volume in dB (default: 0.0)
    pub initial_volume: f32,

    /// Lowest volume in dB; this level is silence (default: -40.0)
    pub volume_min: f32,

    /// Highest volume in dB (default: 40.0)
    pub volume_max: f32,

    /// Repeat mode at startup
    pub repeat: RepeatMode,

    /// Completed songs between advertisements (default: 5)
    pub ad_threshold: u32,

    /// Cadence of `PlaybackProgress` events (default: 100ms)
    pub progress_interval_ms: u64,

    /// Fraction of a song that must play to count as finished (default: 0.95)
    pub finished_ratio: f64,

    /// Rewind distance of `replay_five_seconds` (default: 5000ms)
    pub replay_window_ms: u64,

    /// Upper bound on waiting for a worker thread to exit (default: 2000ms)
    pub join_timeout_ms: u64,

    /// Start the spectrum analysis threads with the player
    #[cfg(feature = "spectrum")]
    pub spectrum_enabled: bool,

    #[cfg(feature = "spectrum")]
    pub spectrum: SpectrumConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            history_capacity: 20,
            initial_volume: 0.0,
            volume_min: -40.0,
            volume_max: 40.0,
            repeat: RepeatMode::NoRepeat,
            ad_threshold: 5,
            progress_interval_ms: 100,
            finished_ratio: 0.95,
            replay_window_ms: 5_000,
            join_timeout_ms: 2_000,
            #[cfg(feature = "spectrum")]
            spectrum_enabled: true,
            #[cfg(feature = "spectrum")]
            spectrum: SpectrumConfig::default(),
        }
    }
}

impl PlayerConfig {
    /// Check value ranges
    ///
    /// # Errors
    /// Returns a description of the first invalid field
    pub fn validate(&self) -> Result<(), String> {
        if self.history_capacity == 0 {
            return Err("history_capacity must be > 0".into());
        }
        if self.volume_min >= self.volume_max {
            return Err("volume_min must be below volume_max".into());
        }
        if !(self.volume_min..=self.volume_max).contains(&self.initial_volume) {
            return Err("initial_volume must lie within the volume range".into());
        }
        if self.ad_threshold == 0 {
            return Err("ad_threshold must be > 0".into());
        }
        if !(0.0..=1.0).contains(&self.finished_ratio) {
            return Err("finished_ratio must be in [0, 1]".into());
        }
        if self.progress_interval_ms == 0 {
            return Err("progress_interval_ms must be > 0".into());
        }
        #[cfg(feature = "spectrum")]
        if self.spectrum_enabled {
            self.spectrum.validate().map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}
