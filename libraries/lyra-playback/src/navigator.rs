//! Playlist traversal
//!
//! The navigator owns a derived play order (indices into the caller's
//! playlist) and a cursor into that order. The caller's playlist is never
//! reordered; shuffling only permutes the part of the order that has not
//! been played yet.

use crate::types::RepeatMode;
use lyra_core::{Playlist, Song};
use rand::seq::SliceRandom;
use rand::Rng;

/// Result of asking the navigator for another song
#[derive(Debug, Clone, PartialEq)]
pub enum NavStep {
    /// Load `song`, found at `cursor` in the play order
    Load { cursor: usize, song: Song },

    /// No further song: playback ends
    Finished,
}

/// Selects the next/previous song according to repeat mode and shuffle
#[derive(Debug, Clone, Default)]
pub struct PlaylistNavigator {
    playlist: Option<Playlist>,

    /// Songs in caller order (the single song when no playlist is loaded)
    songs: Vec<Song>,

    /// Play order as indices into `songs`
    order: Vec<usize>,

    /// Position of the current song within `order`
    cursor: usize,

    shuffled: bool,
}

impl PlaylistNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything with `playlist`, positioned on its first song
    pub fn load_playlist(&mut self, playlist: Playlist) {
        self.songs = playlist.songs.clone();
        self.order = (0..self.songs.len()).collect();
        self.cursor = 0;
        self.shuffled = false;
        self.playlist = Some(playlist);
    }

    /// Replace everything with a single song
    pub fn load_song(&mut self, song: Song) {
        self.songs = vec![song];
        self.order = vec![0];
        self.cursor = 0;
        self.shuffled = false;
        self.playlist = None;
    }

    pub fn playlist(&self) -> Option<&Playlist> {
        self.playlist.as_ref()
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffled
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&Song> {
        self.order.get(self.cursor).and_then(|&i| self.songs.get(i))
    }

    /// Index of the current song in the caller's playlist
    pub fn current_index(&self) -> Option<usize> {
        self.order.get(self.cursor).copied()
    }

    /// Songs in play order
    pub fn order(&self) -> impl Iterator<Item = &Song> {
        self.order.iter().filter_map(move |&i| self.songs.get(i))
    }

    /// Songs after the current one in play order
    pub fn upcoming(&self) -> impl Iterator<Item = &Song> {
        self.order
            .iter()
            .skip(self.cursor + 1)
            .filter_map(move |&i| self.songs.get(i))
    }

    /// Song an explicit `next` would select
    pub fn peek_next(&self, mode: RepeatMode) -> NavStep {
        if self.is_empty() {
            return NavStep::Finished;
        }
        match mode {
            RepeatMode::RepeatOne => self.step_at(self.cursor),
            RepeatMode::RepeatAll => self.step_at((self.cursor + 1) % self.order.len()),
            RepeatMode::NoRepeat => {
                if self.cursor + 1 < self.order.len() {
                    self.step_at(self.cursor + 1)
                } else {
                    NavStep::Finished
                }
            }
        }
    }

    /// Song an explicit `previous` would select
    ///
    /// Repeat-one behaves like repeat-all here. Without repeat, `previous`
    /// on the first song reloads it.
    pub fn peek_previous(&self, mode: RepeatMode) -> NavStep {
        if self.is_empty() {
            return NavStep::Finished;
        }
        let len = self.order.len();
        match mode {
            RepeatMode::RepeatAll | RepeatMode::RepeatOne => {
                self.step_at((self.cursor + len - 1) % len)
            }
            RepeatMode::NoRepeat => self.step_at(self.cursor.saturating_sub(1)),
        }
    }

    /// Song natural completion leads to
    ///
    /// Identical to `peek_next`: repeat-one replays, repeat-all wraps, and
    /// no-repeat finishes after the last song.
    pub fn peek_completion(&self, mode: RepeatMode) -> NavStep {
        self.peek_next(mode)
    }

    /// Commit a step returned by one of the `peek_*` methods
    pub fn commit(&mut self, step: &NavStep) {
        if let NavStep::Load { cursor, .. } = step {
            if *cursor < self.order.len() {
                self.cursor = *cursor;
            }
        }
    }

    /// Randomize the songs after the current one
    ///
    /// Returns `false` (and changes nothing) for playlists of one song or
    /// fewer. The current song keeps its place; already played songs keep
    /// theirs, so nothing repeats within a round.
    pub fn shuffle_remaining<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if self.songs.len() <= 1 {
            return false;
        }
        let start = (self.cursor + 1).min(self.order.len());
        self.order[start..].shuffle(rng);
        self.shuffled = true;
        true
    }

    fn step_at(&self, cursor: usize) -> NavStep {
        match self.order.get(cursor).and_then(|&i| self.songs.get(i)) {
            Some(song) => NavStep::Load {
                cursor,
                song: song.clone(),
            },
            None => NavStep::Finished,
        }
    }
}
