//! Streaming sample rate conversion
//!
//! Wraps rubato's windowed-sinc `SincFixedIn`. MP3 frames arrive in 1152
//! (or 576) frame packets while the resampler consumes fixed chunks, so
//! input is buffered and only whole chunks are processed. The filter state
//! carries over between calls, so consecutive packets join without seams.

use crate::error::{AudioError, Result};
use rubato::{
    Resampler as _, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
    WindowFunction,
};
use std::collections::VecDeque;

/// Input frames per rubato call
pub const CHUNK_FRAMES: usize = 1024;

/// Sinc resampler fed with interleaved PCM
pub struct StreamResampler {
    inner: SincFixedIn<f32>,
    input_rate: u32,
    output_rate: u32,
    channels: usize,
    /// Interleaved input not yet processed, always less than one chunk between calls
    pending: VecDeque<f32>,
}

impl StreamResampler {
    /// Create a resampler from `input_rate` to `output_rate` Hz
    ///
    /// # Errors
    /// Returns `AudioError::Resample` for a zero rate or channel count
    pub fn new(input_rate: u32, output_rate: u32, channels: usize) -> Result<Self> {
        if input_rate == 0 || output_rate == 0 || channels == 0 {
            return Err(AudioError::Resample(format!(
                "cannot resample {channels} channels from {input_rate} Hz to {output_rate} Hz"
            )));
        }

        let params = SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };
        let ratio = f64::from(output_rate) / f64::from(input_rate);
        let inner = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_FRAMES, channels)?;

        Ok(Self {
            inner,
            input_rate,
            output_rate,
            channels,
            pending: VecDeque::with_capacity(CHUNK_FRAMES * channels * 2),
        })
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Filter delay in output frames
    pub fn latency(&self) -> usize {
        self.inner.output_delay()
    }

    /// Interleaved frames buffered until the next full chunk
    pub fn buffered_frames(&self) -> usize {
        self.pending.len() / self.channels
    }

    /// Resample interleaved `input`
    ///
    /// Returns every output frame that whole chunks could produce; a partial
    /// chunk stays buffered for the next call.
    ///
    /// # Errors
    /// Returns `AudioError::Resample` if `input` is not whole frames or
    /// rubato rejects a chunk
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        if input.len() % self.channels != 0 {
            return Err(AudioError::Resample(format!(
                "{} samples is not a whole number of {}-channel frames",
                input.len(),
                self.channels
            )));
        }
        self.pending.extend(input.iter().copied());

        let mut output = Vec::new();
        loop {
            let needed = self.inner.input_frames_next();
            if self.pending.len() < needed * self.channels {
                break;
            }

            let chunk: Vec<f32> = self.pending.drain(..needed * self.channels).collect();
            let planar = self.inner.process(&deinterleave(&chunk, self.channels), None)?;
            output.extend(interleave(&planar));
        }
        Ok(output)
    }

    /// Drop buffered input and the filter history
    pub fn reset(&mut self) {
        self.pending.clear();
        self.inner.reset();
    }
}

/// `[L, R, L, R]` into `[[L, L], [R, R]]`
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (channel, &sample) in planar.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }
    planar
}

/// `[[L, L], [R, R]]` into `[L, R, L, R]`
fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let frames = planar.first().map_or(0, Vec::len);
    let mut out = Vec::with_capacity(frames * planar.len());
    for index in 0..frames {
        out.extend(planar.iter().map(|channel| channel[index]));
    }
    out
}
