//! Domain types shared by every Lyra crate

mod ids;
mod listener;
mod playlist;
mod song;

pub use ids::{ListenerId, SongId};
pub use listener::{Listener, ListenerRole};
pub use playlist::Playlist;
pub use song::{AudioLocation, Song};
