//! Platform seams: frame decoding and audio output
//!
//! The player never touches a codec or an audio device directly. Desktop
//! builds plug in symphonia and cpal through these traits; tests plug in
//! scripted mocks.

use crate::error::Result;
use lyra_core::Song;

/// One decoded frame of interleaved PCM
#[derive(Debug, Clone, PartialEq)]
pub struct PcmFrame {
    /// Interleaved samples, nominally in [-1.0, 1.0]
    pub samples: Vec<f32>,

    pub channels: u16,

    pub sample_rate: u32,
}

impl PcmFrame {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
        }
    }

    /// Samples per channel
    pub fn len_per_channel(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }
}

/// Sequential decoder over one song's compressed frames
///
/// Frames come out strictly in order. Only the playback thread calls
/// `decode_next_frame` on a given source; the handle is released on drop.
pub trait FrameSource: Send {
    /// Decode the next frame
    ///
    /// # Returns
    /// * `Ok(Some(frame))` - next frame
    /// * `Ok(None)` - end of stream
    /// * `Err(PlaybackError::Decode)` - corrupt or truncated frame
    fn decode_next_frame(&mut self) -> Result<Option<PcmFrame>>;

    /// Number of frames consumed so far
    fn position(&self) -> u64;

    /// Advance `count` frames without producing output
    ///
    /// Returns the number of frames actually skipped, which is smaller than
    /// `count` only if the stream ended first.
    fn skip_frames(&mut self, count: u64) -> Result<u64> {
        let mut skipped = 0;
        while skipped < count {
            match self.decode_next_frame()? {
                Some(_) => skipped += 1,
                None => break,
            }
        }
        Ok(skipped)
    }
}

/// Opens a [`FrameSource`] for a song's audio bytes
pub trait FrameSourceOpener: Send + Sync {
    /// Open a fresh stream positioned at frame 0
    ///
    /// # Errors
    /// Returns `PlaybackError::Resource` if the stream cannot be opened
    fn open(&self, song: &Song) -> Result<Box<dyn FrameSource>>;
}

/// Destination for decoded PCM
///
/// `write` blocks until the samples are accepted, which paces the playback
/// thread to real time. Sinks are created on, and never leave, the playback
/// thread, so they need not be `Send`.
pub trait AudioSink {
    /// Queue samples for output
    fn write(&mut self, samples: &[f32], channels: u16, sample_rate: u32) -> Result<()>;
}

/// Creates an [`AudioSink`] on the playback thread
pub trait AudioSinkFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn AudioSink>>;
}

/// Sink that discards all audio without pacing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn write(&mut self, _samples: &[f32], _channels: u16, _sample_rate: u32) -> Result<()> {
        Ok(())
    }
}

impl AudioSinkFactory for NullSink {
    fn create(&self) -> Result<Box<dyn AudioSink>> {
        Ok(Box::new(NullSink))
    }
}
