//! MP3 frame source using the Symphonia decoder
//!
//! One compressed packet is one MP3 frame, so the source hands out exactly
//! one [`PcmFrame`] per packet and counts packets as its position. A packet
//! that fails to decode becomes a frame of silence of the same length, which
//! keeps the position equal to the number of frames handed out.
//!
//! ## Sample conversion
//!
//! Every Symphonia sample format goes through the same interleaving helper
//! (`interleave_f32`); only the normalization closure differs per format:
//! - **Float formats**: pass through (F32) or cast (F64)
//! - **Signed ints**: divide by MAX
//! - **Unsigned ints**: normalize to [0,1], scale to [-1,1]
//! - **24-bit types**: extract `.inner()`, normalize
//!
//! Channel layout is preserved; the output sink adapts it to the device.

use crate::error::{AudioError, Result};
use lyra_core::{AudioLocation, Song};
use lyra_playback::{FrameSource, FrameSourceOpener, PcmFrame};
use std::fs::File;
use std::io::Cursor;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::{Hint, ProbeResult};
use symphonia::core::sample::Sample;
use tracing::{debug, warn};

/// Consecutive undecodable packets tolerated before giving up on a stream
const MAX_CORRUPT_PACKETS: usize = 8;

/// Samples per channel in an MPEG-1 Layer III frame
const MP3_FRAME_SAMPLES: usize = 1152;

/// Open a media stream for `location` and probe its container
pub(crate) fn probe_location(location: &AudioLocation) -> Result<ProbeResult> {
    let source: Box<dyn MediaSource> = match location {
        AudioLocation::File(path) => Box::new(File::open(path)?),
        AudioLocation::Memory(bytes) => Box::new(Cursor::new(bytes.clone())),
    };
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    match location.extension() {
        Some(ext) => {
            hint.with_extension(ext);
        }
        None => {
            hint.mime_type("audio/mpeg");
        }
    }

    symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AudioError::Probe(e.to_string()))
}

/// Sequential MP3 decoder for one song
pub struct Mp3Source {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    position: u64,
    finished: bool,

    /// (channels, sample rate) of the last decoded frame
    last_spec: Option<(u16, u32)>,

    /// Undecodable packets in a row
    corrupt_run: usize,
}

impl Mp3Source {
    /// Open `location` positioned at frame 0
    pub fn open(location: &AudioLocation) -> Result<Self> {
        let probed = probe_location(location)?;
        let reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::Probe("no audio track found".into()))?;
        let track_id = track.id;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::Probe(format!("failed to create decoder: {e}")))?;

        debug!(
            track_id,
            sample_rate = ?track.codec_params.sample_rate,
            channels = ?track.codec_params.channels.map(|c| c.count()),
            "Opened MP3 stream"
        );

        Ok(Self {
            reader,
            decoder,
            track_id,
            position: 0,
            finished: false,
            last_spec: None,
            corrupt_run: 0,
        })
    }

    /// Next packet of our track; `None` at end of stream
    fn next_packet(&mut self) -> Result<Option<Packet>> {
        if self.finished {
            return Ok(None);
        }
        loop {
            match self.reader.next_packet() {
                Ok(packet) if packet.track_id() == self.track_id => return Ok(Some(packet)),
                Ok(_) => {}
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.finished = true;
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.finished = true;
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn decode_frame(&mut self) -> Result<Option<PcmFrame>> {
        let Some(packet) = self.next_packet()? else {
            return Ok(None);
        };
        self.position += 1;

        match self.decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let channels = spec.channels.count() as u16;
                self.last_spec = Some((channels, spec.rate));
                self.corrupt_run = 0;
                let samples = convert_to_f32_interleaved(decoded);
                Ok(Some(PcmFrame::new(samples, channels, spec.rate)))
            }
            // A single bad frame is common in MP3s found in the wild
            Err(SymphoniaError::DecodeError(msg)) if self.corrupt_run < MAX_CORRUPT_PACKETS => {
                self.corrupt_run += 1;
                warn!(frame = self.position, error = msg, "Concealing corrupt MP3 frame");
                let frames = usize::try_from(packet.dur).unwrap_or(0);
                Ok(Some(self.silent_frame(frames)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Silence standing in for an undecodable packet of `frames` samples per channel
    fn silent_frame(&self, frames: usize) -> PcmFrame {
        let params = self.decoder.codec_params();
        let (channels, rate) = self.last_spec.unwrap_or((
            params.channels.map_or(2, |c| c.count() as u16),
            params.sample_rate.unwrap_or(44_100),
        ));
        concealment(frames, channels, rate)
    }
}

/// Silent frame of `frames` samples per channel, one MP3 frame when unknown
fn concealment(frames: usize, channels: u16, sample_rate: u32) -> PcmFrame {
    let frames = if frames == 0 { MP3_FRAME_SAMPLES } else { frames };
    PcmFrame::new(vec![0.0; frames * channels as usize], channels, sample_rate)
}

impl FrameSource for Mp3Source {
    fn decode_next_frame(&mut self) -> lyra_playback::Result<Option<PcmFrame>> {
        Ok(self.decode_frame()?)
    }

    fn position(&self) -> u64 {
        self.position
    }

    /// Skip by reading packets without decoding them
    fn skip_frames(&mut self, count: u64) -> lyra_playback::Result<u64> {
        self.corrupt_run = 0;
        let mut skipped = 0;
        while skipped < count {
            if self.next_packet()?.is_none() {
                break;
            }
            self.position += 1;
            skipped += 1;
        }
        // Bit reservoir refers to skipped frames
        self.decoder.reset();
        Ok(skipped)
    }
}

/// Opens songs with [`Mp3Source`]
#[derive(Debug, Default, Clone, Copy)]
pub struct Mp3Opener;

impl FrameSourceOpener for Mp3Opener {
    fn open(&self, song: &Song) -> lyra_playback::Result<Box<dyn FrameSource>> {
        let source = Mp3Source::open(&song.location).map_err(|e| {
            warn!(song = %song.id, error = %e, "Failed to open song");
            e
        })?;
        Ok(Box::new(source))
    }
}

/// Interleave a planar buffer of any sample type to f32
///
/// `normalize` maps one sample of type `T` into [-1.0, 1.0].
fn interleave_f32<T, F>(buf: &AudioBuffer<T>, normalize: F) -> Vec<f32>
where
    T: Sample,
    F: Fn(T) -> f32,
{
    let channels = buf.spec().channels.count();
    let frames = buf.frames();
    let mut output = Vec::with_capacity(frames * channels);

    for frame_idx in 0..frames {
        for ch in 0..channels {
            output.push(normalize(buf.chan(ch)[frame_idx]));
        }
    }

    output
}

/// Convert a decoded buffer to interleaved f32 samples
fn convert_to_f32_interleaved(decoded: AudioBufferRef<'_>) -> Vec<f32> {
    match decoded {
        AudioBufferRef::F32(buf) => interleave_f32(&buf, |s| s),
        AudioBufferRef::F64(buf) => interleave_f32(&buf, |s| s as f32),

        AudioBufferRef::S8(buf) => interleave_f32(&buf, |s| s as f32 / i8::MAX as f32),
        AudioBufferRef::S16(buf) => interleave_f32(&buf, |s| s as f32 / i16::MAX as f32),
        AudioBufferRef::S24(buf) => interleave_f32(&buf, |s| s.inner() as f32 / 8388607.0),
        AudioBufferRef::S32(buf) => interleave_f32(&buf, |s| s as f32 / i32::MAX as f32),

        AudioBufferRef::U8(buf) => {
            interleave_f32(&buf, |s| (s as f32 / u8::MAX as f32) * 2.0 - 1.0)
        }
        AudioBufferRef::U16(buf) => {
            interleave_f32(&buf, |s| (s as f32 / u16::MAX as f32) * 2.0 - 1.0)
        }
        AudioBufferRef::U24(buf) => {
            interleave_f32(&buf, |s| (s.inner() as f32 / 16777215.0) * 2.0 - 1.0)
        }
        AudioBufferRef::U32(buf) => {
            interleave_f32(&buf, |s| (s as f64 / u32::MAX as f64) as f32 * 2.0 - 1.0)
        }
    }
}
