//! Windowed FFT pipeline
//!
//! PCM is downmixed to mono, clamped to [-1, 1] and kept in a ring as long
//! as the longest transform. Every `hop_size` samples each transform of the
//! layout runs Hann-windowed over the newest samples, the bars are read from
//! their own transform, pushed into a short history and recomputed into
//! compressed bar targets.

use crate::bands::BandLayout;
use crate::config::SpectrumConfig;
use crate::error::Result;
use crate::MAX_AMPLITUDE;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::Arc;

/// One transform length and its buffers
struct Transform {
    size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

impl Transform {
    fn new(planner: &mut FftPlanner<f32>, size: usize) -> Self {
        Self {
            size,
            fft: planner.plan_fft_forward(size),
            window: hann_window(size),
            scratch: vec![Complex::new(0.0, 0.0); size],
        }
    }
}

/// Computes bar targets from PCM
pub struct SpectrumAnalyzer {
    config: SpectrumConfig,
    layout: BandLayout,
    transforms: Vec<Transform>,
    /// Newest `layout.longest_window()` mono samples, zeros before the first
    recent: VecDeque<f32>,
    /// Samples received since the last reset, saturating at the ring length
    filled: usize,
    /// Samples received since the last analysis
    since_hop: usize,
    spectra: Vec<Vec<f32>>,
    history: VecDeque<Vec<f32>>,
    targets: Vec<f32>,
}

impl SpectrumAnalyzer {
    /// Create an analyzer for PCM at `sample_rate`
    ///
    /// # Errors
    /// Returns `InvalidConfig` if `config` fails validation
    pub fn new(config: SpectrumConfig, sample_rate: u32) -> Result<Self> {
        config.validate()?;

        let layout = BandLayout::new(&config, sample_rate);
        let targets = vec![0.0; config.bars];

        let mut analyzer = Self {
            layout,
            transforms: Vec::new(),
            recent: VecDeque::new(),
            filled: 0,
            since_hop: 0,
            spectra: Vec::new(),
            history: VecDeque::with_capacity(config.history_frames),
            targets,
            config,
        };
        analyzer.plan_transforms();
        Ok(analyzer)
    }

    pub fn config(&self) -> &SpectrumConfig {
        &self.config
    }

    pub fn layout(&self) -> &BandLayout {
        &self.layout
    }

    /// Most recently computed bar targets (held when no new PCM arrives)
    pub fn targets(&self) -> &[f32] {
        &self.targets
    }

    /// Forget buffered samples, history and targets
    pub fn reset(&mut self) {
        self.recent.iter_mut().for_each(|s| *s = 0.0);
        self.filled = 0;
        self.since_hop = 0;
        self.history.clear();
        self.targets.iter_mut().for_each(|t| *t = 0.0);
    }

    /// Feed interleaved PCM
    ///
    /// Returns the new bar targets when at least one window was analysed,
    /// `None` when more samples are needed. A change of sample rate rebuilds
    /// the bar layout and drops buffered state.
    pub fn push_interleaved(
        &mut self,
        samples: &[f32],
        channels: u16,
        sample_rate: u32,
    ) -> Option<Vec<f32>> {
        if channels == 0 || sample_rate == 0 {
            return None;
        }

        if sample_rate != self.layout.sample_rate() {
            tracing::debug!(
                from = self.layout.sample_rate(),
                to = sample_rate,
                "Spectrum sample rate changed, rebuilding layout"
            );
            self.layout = BandLayout::new(&self.config, sample_rate);
            self.plan_transforms();
            self.reset();
        }

        let channels = channels as usize;
        let mono: Vec<f32> = samples
            .chunks_exact(channels)
            .map(|frame| {
                let mono = frame.iter().sum::<f32>() / channels as f32;
                if mono.is_finite() {
                    mono.clamp(-1.0, 1.0)
                } else {
                    0.0
                }
            })
            .collect();

        // Sample indices that complete a hop once the shortest window is full
        let capacity = self.recent.len();
        let mut due = Vec::new();
        for index in 0..mono.len() {
            self.filled = (self.filled + 1).min(capacity);
            self.since_hop += 1;
            if self.filled >= self.config.window_size && self.since_hop >= self.config.hop_size {
                due.push(index);
                self.since_hop = 0;
            }
        }
        // Levels older than the history would be evicted before returning
        let skipped = due.len().saturating_sub(self.config.history_frames);
        let mut due = due[skipped..].iter().copied().peekable();

        let analysed = due.peek().is_some();
        for (index, sample) in mono.into_iter().enumerate() {
            self.recent.pop_front();
            self.recent.push_back(sample);
            if due.next_if_eq(&index).is_some() {
                self.analyse_window();
            }
        }

        if analysed {
            self.recompute_targets();
            Some(self.targets.clone())
        } else {
            None
        }
    }

    /// Build one transform per layout resolution and size the ring to match
    fn plan_transforms(&mut self) {
        let mut planner = FftPlanner::new();
        self.transforms = self
            .layout
            .resolutions()
            .iter()
            .map(|&size| Transform::new(&mut planner, size))
            .collect();
        self.spectra = self
            .transforms
            .iter()
            .map(|t| vec![0.0; t.size / 2])
            .collect();
        self.recent = VecDeque::from(vec![0.0; self.layout.longest_window()]);
        self.filled = 0;
        self.since_hop = 0;
    }

    fn analyse_window(&mut self) {
        let c = self.config.magnitude_scale;
        let d = self.config.magnitude_divisor;

        for (transform, magnitudes) in self.transforms.iter_mut().zip(self.spectra.iter_mut()) {
            let newest = self.recent.range(self.recent.len() - transform.size..);
            for ((slot, &sample), &w) in transform
                .scratch
                .iter_mut()
                .zip(newest)
                .zip(transform.window.iter())
            {
                *slot = Complex::new(sample * w, 0.0);
            }

            transform.fft.process(&mut transform.scratch);

            // A full-scale sine peaks at |X| = N/4 under a Hann window
            let norm = 4.0 / transform.size as f32;
            for (mag, bin) in magnitudes.iter_mut().zip(transform.scratch.iter()) {
                *mag = (1.0 + bin.norm() * norm * c).log10() / d;
            }
        }

        if self.history.len() == self.config.history_frames {
            self.history.pop_front();
        }
        self.history.push_back(self.layout.levels(&self.spectra));
    }

    fn recompute_targets(&mut self) {
        let total_weight: f32 = (1..=self.history.len()).map(|w| w as f32).sum();
        if total_weight == 0.0 {
            return;
        }

        for (bar, target) in self.targets.iter_mut().enumerate() {
            let weighted: f32 = self
                .history
                .iter()
                .enumerate()
                .map(|(age, levels)| levels.get(bar).copied().unwrap_or(0.0) * (age + 1) as f32)
                .sum();
            let averaged = weighted / total_weight;
            let compressed = self.layout.compressor(&self.config, bar).apply(averaged);
            *target = compressed.clamp(0.0, MAX_AMPLITUDE);
        }
    }
}

/// Symmetric Hann window of length `n`
fn hann_window(n: usize) -> Vec<f32> {
    let denom = (n - 1) as f32;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / denom).cos()))
        .collect()
}
