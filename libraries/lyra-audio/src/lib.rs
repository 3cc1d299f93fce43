//! Desktop audio for Lyra
//!
//! Implements the `lyra-playback` platform seams:
//!
//! - [`Mp3Opener`] / [`Mp3Source`]: Symphonia MP3 decoding, one PCM frame per
//!   MP3 frame, from files or in-memory bytes
//! - [`CpalSinkFactory`] / [`CpalSink`]: default output device via CPAL,
//!   fed through a lock-free ring
//! - [`StreamResampler`]: rubato sinc conversion to the device rate
//! - [`probe_song`]: builds `Song` metadata (frame count, duration, tags)
//!   from a file
//! - [`FileLibrary`]: probed files grouped into playlists, served as a
//!   `MetadataProvider`
//!
//! # Example
//!
//! ```no_run
//! use lyra_audio::{probe_song, CpalSinkFactory, Mp3Opener};
//! use lyra_playback::Player;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let song = probe_song("/music/intro.mp3", "intro")?;
//! let player = Player::builder(Arc::new(Mp3Opener), Arc::new(CpalSinkFactory::new())).build()?;
//! player.load_song(song)?;
//! player.play()?;
//! # Ok(())
//! # }
//! ```

mod decoder;
mod error;
mod output;
mod probe;
mod resample;

pub use decoder::{Mp3Opener, Mp3Source};
pub use error::{AudioError, Result};
pub use output::{adapt_channels, CpalSink, CpalSinkFactory, DEFAULT_BUFFER_MS};
pub use probe::{probe_song, FileLibrary};
pub use resample::{StreamResampler, CHUNK_FRAMES};
