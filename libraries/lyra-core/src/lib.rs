//! Lyra Core
//!
//! Platform-agnostic domain types and collaborator traits for the Lyra
//! playback engine.
//!
//! The engine never fetches, persists or renders anything itself. Songs,
//! playlists, advertisement clips and listener roles are resolved by
//! collaborators and handed over as read-only values:
//! - **Domain Types**: `Song`, `Playlist`, `Listener`, `ListenerRole`
//! - **Collaborator Traits**: `MetadataProvider`, `AdContentProvider`, `RoleProvider`
//! - **Error Handling**: `LyraError` and `Result`
//! - **Threads**: `WorkerThread`, joined with a deadline
//!
//! # Example
//!
//! ```rust
//! use lyra_core::{AudioLocation, Playlist, Song};
//!
//! let song = Song::new("1", "Intro", "Artist", 10_000, 380, AudioLocation::file("/music/intro.mp3"));
//! assert_eq!(song.frames_for_ms(5_000), 190);
//!
//! let playlist = Playlist::new("Mix", vec![song]);
//! assert_eq!(playlist.len(), 1);
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod traits;
pub mod types;
pub mod worker;

pub use error::{LyraError, Result};
pub use traits::{AdContentProvider, MetadataProvider, RoleProvider, StaticAdContent, StaticRoles};
pub use types::{AudioLocation, Listener, ListenerId, ListenerRole, Playlist, Song, SongId};
pub use worker::{JoinError, WorkerThread};
