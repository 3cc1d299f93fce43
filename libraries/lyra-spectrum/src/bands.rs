//! Mapping of FFT bins onto display bars
//!
//! The bar scale has three segments:
//! - bass: linear between `min_hz` and `low_split_hz`
//! - mid: logarithmic between `low_split_hz` and `mid_split_hz`
//! - treble: logarithmic between `mid_split_hz` and `min(max_hz, nyquist)`
//!
//! Each segment is read from its own transform length, long enough that
//! its narrowest bar spans [`BINS_PER_BAR`] bins. Within one transform the
//! bars partition the bins, so a bin never feeds two bars.
//!
//! Each bar averages its bins with a centered triangular weighting, then
//! scales the result by an empirical loudness weight for its segment.

use crate::config::{CompressorBand, SpectrumConfig};

/// Minimum bin count of the narrowest bar in a segment, transform length permitting
pub const BINS_PER_BAR: f32 = 6.0;

/// Frequency segment a bar belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BandSegment {
    Bass,
    Mid,
    Treble,
}

/// One display bar and the bins it covers
#[derive(Debug, Clone, PartialEq)]
pub struct BarBand {
    pub segment: BandSegment,

    /// Lower frequency edge (Hz)
    pub low_hz: f32,

    /// Upper frequency edge (Hz)
    pub high_hz: f32,

    /// Index into [`BandLayout::resolutions`] of the transform this bar reads
    pub resolution: usize,

    /// First FFT bin (inclusive)
    pub start_bin: usize,

    /// Last FFT bin (exclusive), always > `start_bin`
    pub end_bin: usize,

    /// Perceptual weight applied after averaging
    pub loudness: f32,
}

impl BarBand {
    /// Triangular weight of `bin` inside this band, peaking at the center
    #[inline]
    pub fn weight(&self, bin: usize) -> f32 {
        let width = (self.end_bin - self.start_bin) as f32;
        let t = ((bin - self.start_bin) as f32 + 0.5) / width;
        1.0 - (2.0 * t - 1.0).abs()
    }

    /// Weighted average of `spectrum` over this band's bins
    pub fn level(&self, spectrum: &[f32]) -> f32 {
        let end = self.end_bin.min(spectrum.len());
        if self.start_bin >= end {
            return 0.0;
        }

        let mut sum = 0.0;
        let mut weights = 0.0;
        for (bin, value) in spectrum.iter().enumerate().take(end).skip(self.start_bin) {
            let w = self.weight(bin);
            sum += value * w;
            weights += w;
        }

        if weights > 0.0 {
            sum / weights * self.loudness
        } else {
            0.0
        }
    }

    /// Center frequency on the segment's own scale
    pub fn center_hz(&self) -> f32 {
        match self.segment {
            BandSegment::Bass => (self.low_hz + self.high_hz) / 2.0,
            BandSegment::Mid | BandSegment::Treble => (self.low_hz * self.high_hz).sqrt(),
        }
    }
}

/// Bar layout for a given sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct BandLayout {
    bands: Vec<BarBand>,
    sample_rate: u32,
    resolutions: Vec<usize>,
}

impl BandLayout {
    /// Build the layout described by `config` for `sample_rate`
    ///
    /// `config` is expected to have passed [`SpectrumConfig::validate`].
    pub fn new(config: &SpectrumConfig, sample_rate: u32) -> Self {
        let nyquist = sample_rate as f32 / 2.0;
        let top = config.max_hz.min(nyquist).max(config.mid_split_hz);
        let treble_bars = config.treble_bars();

        let mut edges: Vec<(BandSegment, f32, f32, f32)> = Vec::with_capacity(config.bars);

        for i in 0..config.low_bars {
            let lo = linear_edge(config.min_hz, config.low_split_hz, i, config.low_bars);
            let hi = linear_edge(config.min_hz, config.low_split_hz, i + 1, config.low_bars);
            edges.push((BandSegment::Bass, lo, hi, 1.0));
        }

        for i in 0..config.mid_bars {
            let lo = log_edge(config.low_split_hz, config.mid_split_hz, i, config.mid_bars);
            let hi = log_edge(config.low_split_hz, config.mid_split_hz, i + 1, config.mid_bars);
            edges.push((BandSegment::Mid, lo, hi, 1.15));
        }

        for i in 0..treble_bars {
            let lo = log_edge(config.mid_split_hz, top, i, treble_bars);
            let hi = log_edge(config.mid_split_hz, top, i + 1, treble_bars);
            // Treble rolls off fastest in typical masters, so it gets the steepest lift
            let ramp = if treble_bars > 1 {
                i as f32 / (treble_bars - 1) as f32
            } else {
                0.0
            };
            edges.push((BandSegment::Treble, lo, hi, 1.3 + 0.5 * ramp));
        }

        let mut resolutions: Vec<usize> = Vec::with_capacity(3);
        let mut bands: Vec<BarBand> = Vec::with_capacity(edges.len());

        for segment in [BandSegment::Bass, BandSegment::Mid, BandSegment::Treble] {
            let narrowest = edges
                .iter()
                .filter(|e| e.0 == segment)
                .map(|e| e.2 - e.1)
                .fold(f32::INFINITY, f32::min);
            if !narrowest.is_finite() {
                continue;
            }

            let size = transform_size(config, sample_rate, narrowest);
            let resolution = match resolutions.iter().position(|&n| n == size) {
                Some(index) => index,
                None => {
                    resolutions.push(size);
                    resolutions.len() - 1
                }
            };

            let half = size / 2;
            let bin_hz = sample_rate as f32 / size as f32;
            // Continue after the previous bar on the same transform
            let mut next_free = bands
                .iter()
                .rev()
                .find(|b| b.resolution == resolution)
                .map_or(0, |b| b.end_bin);

            for &(_, low_hz, high_hz, loudness) in edges.iter().filter(|e| e.0 == segment) {
                let start_bin = ((low_hz / bin_hz).round() as usize)
                    .max(next_free)
                    .min(half - 1);
                let end_bin = ((high_hz / bin_hz).round() as usize)
                    .max(start_bin + 1)
                    .min(half);
                next_free = end_bin;
                bands.push(BarBand {
                    segment,
                    low_hz,
                    high_hz,
                    resolution,
                    start_bin,
                    end_bin,
                    loudness,
                });
            }
        }

        Self {
            bands,
            sample_rate,
            resolutions,
        }
    }

    pub fn bands(&self) -> &[BarBand] {
        &self.bands
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Transform lengths the bars read from, indexed by [`BarBand::resolution`]
    pub fn resolutions(&self) -> &[usize] {
        &self.resolutions
    }

    /// Longest transform, i.e. the amount of PCM history analysis needs
    pub fn longest_window(&self) -> usize {
        self.resolutions.iter().copied().max().unwrap_or(0)
    }

    /// Index of the bar whose frequency range contains `hz`
    pub fn bar_for_frequency(&self, hz: f32) -> Option<usize> {
        self.bands
            .iter()
            .position(|b| hz >= b.low_hz && hz < b.high_hz)
    }

    /// Reduce per-bin spectra to one level per bar
    ///
    /// `spectra[i]` holds the magnitudes of the transform `resolutions()[i]`.
    pub fn levels(&self, spectra: &[Vec<f32>]) -> Vec<f32> {
        self.bands
            .iter()
            .map(|b| spectra.get(b.resolution).map_or(0.0, |s| b.level(s)))
            .collect()
    }

    /// Compressor for the segment of bar `index`
    pub fn compressor<'a>(&self, config: &'a SpectrumConfig, index: usize) -> &'a CompressorBand {
        match self.bands.get(index).map(|b| b.segment) {
            Some(BandSegment::Bass) => &config.bass_compressor,
            Some(BandSegment::Mid) => &config.mid_compressor,
            _ => &config.treble_compressor,
        }
    }
}

/// Shortest power-of-two transform giving a bar of `narrowest` Hz
/// [`BINS_PER_BAR`] bins, kept within `window_size..=max_window_size`
fn transform_size(config: &SpectrumConfig, sample_rate: u32, narrowest: f32) -> usize {
    let wanted = (BINS_PER_BAR * sample_rate as f32 / narrowest).ceil() as usize;
    wanted
        .next_power_of_two()
        .clamp(config.window_size, config.max_window_size)
}

fn linear_edge(lo: f32, hi: f32, i: usize, n: usize) -> f32 {
    lo + (hi - lo) * i as f32 / n as f32
}

fn log_edge(lo: f32, hi: f32, i: usize, n: usize) -> f32 {
    lo * (hi / lo).powf(i as f32 / n as f32)
}
