//! Spectrum analyzer configuration

use crate::error::{Result, SpectrumError};
use serde::{Deserialize, Serialize};

/// Dynamic range compression applied to one frequency segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressorBand {
    /// Level above which compression kicks in
    pub threshold: f32,

    /// Compression ratio (2.0 means 2:1 above threshold)
    pub ratio: f32,
}

impl CompressorBand {
    pub const fn new(threshold: f32, ratio: f32) -> Self {
        Self { threshold, ratio }
    }

    /// Compress a single level
    #[inline]
    pub fn apply(&self, level: f32) -> f32 {
        if level > self.threshold {
            self.threshold + (level - self.threshold) / self.ratio
        } else {
            level
        }
    }
}

/// Spectrum analyzer settings
///
/// Defaults target a 32-bar display refreshed at 60 Hz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// Number of output bars (default: 32)
    pub bars: usize,

    /// Shortest FFT window in samples; analysis runs once this much PCM
    /// has arrived (default: 1024)
    pub window_size: usize,

    /// Longest FFT window a narrow segment may be given (default: 16384)
    pub max_window_size: usize,

    /// Samples to advance between transforms (default: 256, i.e. 4x overlap)
    pub hop_size: usize,

    /// Number of analysed frames kept for recency weighting (default: 8)
    pub history_frames: usize,

    /// Animation refresh rate in Hz (default: 60)
    pub fps: u32,

    /// Fraction of the remaining distance covered per animation step
    pub smooth_factor: f32,

    /// Animation frames a peak cap holds before decaying
    pub peak_hold_frames: u32,

    /// Multiplicative peak decay per frame once the hold expires
    pub peak_decay: f32,

    /// `C` in `log10(1 + |X|·C) / D`
    pub magnitude_scale: f32,

    /// `D` in `log10(1 + |X|·C) / D`
    pub magnitude_divisor: f32,

    /// Lowest displayed frequency (Hz)
    pub min_hz: f32,

    /// Boundary between the bass and mid segments (Hz)
    pub low_split_hz: f32,

    /// Boundary between the mid and treble segments (Hz)
    pub mid_split_hz: f32,

    /// Highest displayed frequency, further bounded by Nyquist (Hz)
    pub max_hz: f32,

    /// Bars allotted to the linear bass segment
    pub low_bars: usize,

    /// Bars allotted to the mid segment; the rest go to treble
    pub mid_bars: usize,

    pub bass_compressor: CompressorBand,
    pub mid_compressor: CompressorBand,
    pub treble_compressor: CompressorBand,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            bars: 32,
            window_size: 1024,
            max_window_size: 16_384,
            hop_size: 256,
            history_frames: 8,
            fps: 60,
            smooth_factor: 0.35,
            peak_hold_frames: 20,
            peak_decay: 0.92,
            magnitude_scale: 9.0,
            magnitude_divisor: 1.0,
            min_hz: 20.0,
            low_split_hz: 250.0,
            mid_split_hz: 2_000.0,
            max_hz: 16_000.0,
            low_bars: 8,
            mid_bars: 12,
            bass_compressor: CompressorBand::new(0.8, 3.0),
            mid_compressor: CompressorBand::new(0.9, 2.5),
            treble_compressor: CompressorBand::new(1.0, 2.0),
        }
    }
}

impl SpectrumConfig {
    /// Number of bars in the treble segment
    pub fn treble_bars(&self) -> usize {
        self.bars.saturating_sub(self.low_bars + self.mid_bars)
    }

    /// Check that the configuration can drive an analyzer
    pub fn validate(&self) -> Result<()> {
        if self.bars == 0 {
            return Err(SpectrumError::InvalidConfig("bars must be > 0".into()));
        }
        if !self.window_size.is_power_of_two() || self.window_size < 64 {
            return Err(SpectrumError::InvalidConfig(format!(
                "window_size must be a power of two >= 64, got {}",
                self.window_size
            )));
        }
        if !self.max_window_size.is_power_of_two() || self.max_window_size < self.window_size {
            return Err(SpectrumError::InvalidConfig(format!(
                "max_window_size must be a power of two >= window_size, got {}",
                self.max_window_size
            )));
        }
        if self.hop_size == 0 || self.hop_size > self.window_size / 4 {
            return Err(SpectrumError::InvalidConfig(format!(
                "hop_size must be in 1..={} for at least 4x overlap, got {}",
                self.window_size / 4,
                self.hop_size
            )));
        }
        if self.history_frames == 0 {
            return Err(SpectrumError::InvalidConfig(
                "history_frames must be > 0".into(),
            ));
        }
        if self.fps == 0 {
            return Err(SpectrumError::InvalidConfig("fps must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.smooth_factor) || self.smooth_factor == 0.0 {
            return Err(SpectrumError::InvalidConfig(
                "smooth_factor must be in (0, 1]".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.peak_decay) {
            return Err(SpectrumError::InvalidConfig(
                "peak_decay must be in [0, 1)".into(),
            ));
        }
        if self.magnitude_scale <= 0.0 || self.magnitude_divisor <= 0.0 {
            return Err(SpectrumError::InvalidConfig(
                "magnitude constants must be positive".into(),
            ));
        }
        if !(0.0 < self.min_hz
            && self.min_hz < self.low_split_hz
            && self.low_split_hz < self.mid_split_hz
            && self.mid_split_hz < self.max_hz)
        {
            return Err(SpectrumError::InvalidConfig(
                "frequency splits must satisfy 0 < min < low < mid < max".into(),
            ));
        }
        if self.low_bars + self.mid_bars >= self.bars {
            return Err(SpectrumError::InvalidConfig(
                "low_bars + mid_bars must leave at least one treble bar".into(),
            ));
        }
        for band in [
            self.bass_compressor,
            self.mid_compressor,
            self.treble_compressor,
        ] {
            if band.ratio < 1.0 || band.threshold < 0.0 {
                return Err(SpectrumError::InvalidConfig(
                    "compressor ratio must be >= 1 and threshold >= 0".into(),
                ));
            }
        }
        Ok(())
    }
}
