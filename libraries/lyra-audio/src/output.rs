/// CPAL-based audio sink
///
/// The playback thread pushes interleaved samples into a lock-free SPSC
/// ring (rtrb); the device callback pops them and plays silence on
/// underrun. `write` blocks while the ring is full, which paces decoding to
/// the device clock. Songs at another rate go through a [`StreamResampler`],
/// rebuilt whenever the input rate changes. The sink owns its `Stream`, so
/// it lives and dies on the playback thread.
use crate::error::{AudioError, Result};
use crate::resample::StreamResampler;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Stream;
use lyra_playback::{AudioSink, AudioSinkFactory};
use rtrb::{Producer, RingBuffer};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default device buffering
pub const DEFAULT_BUFFER_MS: u32 = 200;

/// Longest `write` waits for the device before giving up
const STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Creates a [`CpalSink`] on the default output device
#[derive(Debug, Clone, Copy)]
pub struct CpalSinkFactory {
    buffer_ms: u32,
}

impl CpalSinkFactory {
    pub fn new() -> Self {
        Self::with_buffer_ms(DEFAULT_BUFFER_MS)
    }

    /// Buffer `ms` milliseconds between decoder and device
    pub fn with_buffer_ms(ms: u32) -> Self {
        Self { buffer_ms: ms.max(20) }
    }
}

impl Default for CpalSinkFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSinkFactory for CpalSinkFactory {
    fn create(&self) -> lyra_playback::Result<Box<dyn AudioSink>> {
        Ok(Box::new(CpalSink::open_default(self.buffer_ms)?))
    }
}

/// Audio sink feeding the default output device
pub struct CpalSink {
    producer: Producer<f32>,
    device_rate: u32,
    device_channels: u16,
    resampler: Option<StreamResampler>,

    // Dropping the stream stops the device callback
    _stream: Stream,
}

impl CpalSink {
    /// Open the default output device
    ///
    /// # Errors
    /// Returns an error if no device is found or the stream cannot start
    pub fn open_default(buffer_ms: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::DeviceNotFound)?;

        let supported = device.default_output_config()?;
        let device_rate = supported.sample_rate();
        let device_channels = supported.channels();
        let config = supported.config();

        let capacity = (device_rate as usize * device_channels as usize * buffer_ms as usize
            / 1_000)
            .max(1_024);
        let (producer, mut consumer) = RingBuffer::<f32>::new(capacity);

        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for sample in data.iter_mut() {
                    *sample = consumer.pop().unwrap_or(0.0);
                }
            },
            |err| warn!(error = %err, "Audio stream error"),
            None,
        )?;
        stream.play()?;

        info!(device_rate, device_channels, buffer_ms, "Audio output opened");

        Ok(Self {
            producer,
            device_rate,
            device_channels,
            resampler: None,
            _stream: stream,
        })
    }

    pub fn device_rate(&self) -> u32 {
        self.device_rate
    }

    pub fn device_channels(&self) -> u16 {
        self.device_channels
    }

    fn push_blocking(&mut self, samples: &[f32]) -> Result<()> {
        let deadline = Instant::now() + STALL_TIMEOUT;
        let mut offset = 0;

        while offset < samples.len() {
            let free = self.producer.slots();
            if free == 0 {
                if self.producer.is_abandoned() {
                    return Err(AudioError::Play("output stream closed".into()));
                }
                if Instant::now() >= deadline {
                    return Err(AudioError::Play("output device stalled".into()));
                }
                thread::sleep(Duration::from_millis(2));
                continue;
            }

            let end = (offset + free).min(samples.len());
            for &sample in &samples[offset..end] {
                if self.producer.push(sample).is_err() {
                    break;
                }
                offset += 1;
            }
        }
        Ok(())
    }
}

impl AudioSink for CpalSink {
    fn write(
        &mut self,
        samples: &[f32],
        channels: u16,
        sample_rate: u32,
    ) -> lyra_playback::Result<()> {
        let adapted = adapt_channels(samples, channels, self.device_channels);
        if sample_rate == self.device_rate {
            self.resampler = None;
            return Ok(self.push_blocking(&adapted)?);
        }

        let resampler = match self.resampler.take() {
            Some(r) if r.input_rate() == sample_rate => r,
            _ => {
                debug!(from = sample_rate, to = self.device_rate, "Resampling to device rate");
                StreamResampler::new(sample_rate, self.device_rate, self.device_channels as usize)?
            }
        };
        let resampler = self.resampler.insert(resampler);
        let output = resampler.process(&adapted)?;
        Ok(self.push_blocking(&output)?)
    }
}

/// Map interleaved samples from `from` channels to `to` channels
///
/// Mono is spread to every output channel, multi-channel down to mono is
/// averaged, otherwise the first channels are kept and extras are silent.
pub fn adapt_channels(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    let (from, to) = (from as usize, to as usize);
    if from == to || from == 0 || to == 0 {
        return samples.to_vec();
    }

    let frames = samples.len() / from;
    let mut out = Vec::with_capacity(frames * to);
    for frame in samples.chunks_exact(from) {
        if from == 1 {
            out.resize(out.len() + to, frame[0]);
        } else if to == 1 {
            out.push(frame.iter().sum::<f32>() / from as f32);
        } else {
            out.extend((0..to).map(|ch| frame.get(ch).copied().unwrap_or(0.0)));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_is_spread_to_stereo() {
        assert_eq!(adapt_channels(&[0.5, -0.5], 1, 2), vec![0.5, 0.5, -0.5, -0.5]);
    }

    #[test]
    fn stereo_is_averaged_to_mono() {
        assert_eq!(adapt_channels(&[1.0, 0.0, 0.5, 0.5], 2, 1), vec![0.5, 0.5]);
    }

    #[test]
    fn stereo_to_quad_pads_with_silence() {
        assert_eq!(
            adapt_channels(&[0.1, 0.2], 2, 4),
            vec![0.1, 0.2, 0.0, 0.0]
        );
    }
}
