//! Ordered song sequences

use super::song::Song;
use serde::Serialize;

/// An ordered sequence of songs
///
/// Position is significant and the same song may appear more than once.
/// The engine never mutates a playlist; shuffling produces a separate,
/// engine-owned order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Playlist {
    /// Display name
    pub name: String,

    /// Songs in playback order
    pub songs: Vec<Song>,
}

impl Playlist {
    /// Create a playlist from songs in order
    pub fn new(name: impl Into<String>, songs: Vec<Song>) -> Self {
        Self {
            name: name.into(),
            songs,
        }
    }

    /// Number of songs
    pub fn len(&self) -> usize {
        self.songs.len()
    }

    /// Check if the playlist has no songs
    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// Song at `index`
    pub fn get(&self, index: usize) -> Option<&Song> {
        self.songs.get(index)
    }

    /// Iterate songs in order
    pub fn iter(&self) -> impl Iterator<Item = &Song> {
        self.songs.iter()
    }
}
