//! Fixed-rate bar smoothing with peak-hold caps

use crate::config::SpectrumConfig;
use crate::MAX_AMPLITUDE;

/// Smooths bar amplitudes toward their targets, one step per UI frame
///
/// The animator never looks at PCM. It only eases the displayed bars toward
/// the most recent analyzer output and tracks a decaying peak per bar.
#[derive(Debug, Clone)]
pub struct BarAnimator {
    smooth_factor: f32,
    peak_hold_frames: u32,
    peak_decay: f32,
    amplitudes: Vec<f32>,
    targets: Vec<f32>,
    peaks: Vec<f32>,
    hold: Vec<u32>,
}

impl BarAnimator {
    pub fn new(config: &SpectrumConfig) -> Self {
        let bars = config.bars;
        Self {
            smooth_factor: config.smooth_factor,
            peak_hold_frames: config.peak_hold_frames,
            peak_decay: config.peak_decay,
            amplitudes: vec![0.0; bars],
            targets: vec![0.0; bars],
            peaks: vec![0.0; bars],
            hold: vec![0; bars],
        }
    }

    /// Replace the targets the bars ease toward
    ///
    /// Extra values are ignored and missing ones keep their previous target.
    pub fn set_targets(&mut self, targets: &[f32]) {
        for (slot, &t) in self.targets.iter_mut().zip(targets) {
            *slot = t.clamp(0.0, MAX_AMPLITUDE);
        }
    }

    /// Advance one animation frame
    ///
    /// Returns `true` if any bar or peak moved by a visible amount.
    pub fn step(&mut self) -> bool {
        let mut changed = false;

        for i in 0..self.amplitudes.len() {
            let before = self.amplitudes[i];
            let amplitude = (before + (self.targets[i] - before) * self.smooth_factor)
                .clamp(0.0, MAX_AMPLITUDE);
            self.amplitudes[i] = amplitude;

            let peak_before = self.peaks[i];
            if amplitude >= self.peaks[i] {
                self.peaks[i] = amplitude;
                self.hold[i] = self.peak_hold_frames;
            } else if self.hold[i] > 0 {
                self.hold[i] -= 1;
            } else {
                self.peaks[i] = (self.peaks[i] * self.peak_decay).max(amplitude);
            }

            if (amplitude - before).abs() > 1e-4 || (self.peaks[i] - peak_before).abs() > 1e-4 {
                changed = true;
            }
        }

        changed
    }

    pub fn amplitudes(&self) -> &[f32] {
        &self.amplitudes
    }

    pub fn peaks(&self) -> &[f32] {
        &self.peaks
    }

    /// Drop everything back to silence
    pub fn reset(&mut self) {
        for v in self
            .amplitudes
            .iter_mut()
            .chain(self.targets.iter_mut())
            .chain(self.peaks.iter_mut())
        {
            *v = 0.0;
        }
        self.hold.iter_mut().for_each(|h| *h = 0);
    }
}
