//! Lyra - Playback Engine
//!
//! Platform-agnostic playback state machine for MP3 songs and playlists.
//!
//! This crate provides:
//! - Transport commands (play, pause, stop, next, previous, seek, replay)
//! - Command objects with a bounded undo history
//! - Repeat modes (Off, All, One) and shuffle of the remaining songs
//! - Advertisement gating for free-tier listeners
//! - Volume in dB with a silent floor
//! - An event bus for UI surfaces
//! - Spectrum bars for visualizers (`spectrum` feature, on by default)
//!
//! # Architecture
//!
//! `lyra-playback` never touches a codec or an audio device:
//! - Decoding comes in through [`FrameSourceOpener`]/[`FrameSource`]
//! - Output goes out through [`AudioSinkFactory`]/[`AudioSink`]
//! - Ads and listener roles come from `lyra_core` provider traits
//!
//! `lyra-audio` implements the seams with symphonia and cpal.
//!
//! # Example: Commands and Undo
//!
//! ```rust,no_run
//! use lyra_playback::{Command, CommandInvoker, FrameSourceOpener, NullSink, Player, PlayerEvent};
//! use lyra_core::{AudioLocation, Song};
//! use std::sync::Arc;
//!
//! # fn run(opener: Arc<dyn FrameSourceOpener>) -> lyra_playback::Result<()> {
//! let player = Arc::new(Player::builder(opener, Arc::new(NullSink)).listener("alice").build()?);
//!
//! let _sub = player.subscribe(|event: &PlayerEvent| println!("{event:?}"));
//!
//! let mut invoker = CommandInvoker::for_player(Arc::clone(&player));
//! let song = Song::new("1", "Intro", "Artist", 10_000, 380, AudioLocation::file("/music/intro.mp3"));
//! invoker.execute(Command::LoadSong(song))?;
//! invoker.execute(Command::Play)?;
//! invoker.execute(Command::SetVolume(-6.0))?;
//! invoker.undo()?; // back to 0 dB
//! # Ok(())
//! # }
//! ```
//!
//! # Example: Repeat Modes
//!
//! ```rust
//! use lyra_playback::RepeatMode;
//!
//! let mode: RepeatMode = "all".parse().unwrap();
//! assert_eq!(mode, RepeatMode::RepeatAll);
//! assert_eq!(RepeatMode::default(), RepeatMode::NoRepeat);
//! ```

mod ad_gate;
mod command;
mod config;
mod error;
mod event_bus;
mod events;
mod history;
mod navigator;
mod player;
mod source;
pub mod types;
mod volume;

// Public exports
pub use ad_gate::{AdCounter, AdGate};
pub use command::{Command, CommandInvoker, CommandOutcome, Executed, Rejection};
pub use config::PlayerConfig;
pub use error::{PlaybackError, Result};
pub use event_bus::{EventBus, Subscription};
pub use events::{EventKind, PlayerEvent};
pub use history::CommandHistory;
pub use navigator::{NavStep, PlaylistNavigator};
pub use player::{Player, PlayerBuilder};
pub use source::{AudioSink, AudioSinkFactory, FrameSource, FrameSourceOpener, NullSink, PcmFrame};
pub use types::{PlayerState, RepeatMode, SessionSnapshot};
pub use volume::Volume;
