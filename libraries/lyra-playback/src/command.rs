//! Command objects and the undo-capable invoker
//!
//! Every transport operation can be expressed as a [`Command`] value and run
//! through a [`CommandInvoker`], which remembers the most recent applied
//! commands in a fixed-capacity ring so they can be undone.

use crate::error::Result;
use crate::history::CommandHistory;
use crate::player::Player;
use crate::types::{PlayerState, RepeatMode};
use lyra_core::{Playlist, Song};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// One invocable playback operation
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    Replay5s,
    Shuffle,
    /// Volume in dB
    SetVolume(f32),
    LoadSong(Song),
    LoadPlaylist(Playlist),
    SetRepeatMode(RepeatMode),
    SeekToFrame(u64),
    SeekToTimeMs(u64),
}

impl Command {
    /// Run this command against `player`
    ///
    /// # Errors
    /// Only resource and thread failures; rejected transitions come back as
    /// `Ok(CommandOutcome::Rejected(_))`.
    pub fn apply(&self, player: &Player) -> Result<CommandOutcome> {
        match self {
            Self::Play => player.play(),
            Self::Pause => player.pause(),
            Self::Stop => player.stop(),
            Self::Next => player.next(),
            Self::Previous => player.previous(),
            Self::Replay5s => player.replay_five_seconds(),
            Self::Shuffle => player.shuffle_playlist(),
            Self::SetVolume(db) => player.set_volume(*db),
            Self::LoadSong(song) => player.load_song(song.clone()),
            Self::LoadPlaylist(playlist) => player.load_playlist(playlist.clone()),
            Self::SetRepeatMode(mode) => player.set_repeat_mode(*mode),
            Self::SeekToFrame(frame) => player.seek_to_frame(*frame),
            Self::SeekToTimeMs(ms) => player.seek_to_time_ms(*ms),
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::Next => "next",
            Self::Previous => "previous",
            Self::Replay5s => "replay",
            Self::Shuffle => "shuffle",
            Self::SetVolume(_) => "set_volume",
            Self::LoadSong(_) => "load_song",
            Self::LoadPlaylist(_) => "load_playlist",
            Self::SetRepeatMode(_) => "set_repeat_mode",
            Self::SeekToFrame(_) => "seek_to_frame",
            Self::SeekToTimeMs(_) => "seek_to_time_ms",
        }
    }
}

/// Why a command had no effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("no song loaded")]
    NoSongLoaded,

    #[error("an advertisement is playing")]
    AdPlaying,

    #[error("not allowed while {0}")]
    InvalidState(PlayerState),

    #[error("nothing to do")]
    NothingToDo,
}

/// Structured result of a transport operation
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// State changed; `inverse` undoes it when defined
    Applied { inverse: Option<Command> },

    /// State unchanged
    Rejected(Rejection),
}

impl CommandOutcome {
    pub(crate) fn applied() -> Self {
        Self::Applied { inverse: None }
    }

    pub(crate) fn applied_with(inverse: Command) -> Self {
        Self::Applied {
            inverse: Some(inverse),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Rejected(r) => Some(*r),
            Self::Applied { .. } => None,
        }
    }
}

impl From<Rejection> for CommandOutcome {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected(rejection)
    }
}

/// History entry: the command and how to reverse it
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    pub command: Command,
    pub inverse: Option<Command>,
}

/// Executes commands and keeps a bounded undo history
pub struct CommandInvoker {
    player: Arc<Player>,
    history: CommandHistory<Executed>,
}

impl CommandInvoker {
    pub fn new(player: Arc<Player>, capacity: usize) -> Self {
        Self {
            player,
            history: CommandHistory::new(capacity),
        }
    }

    /// Invoker sized by the player's `history_capacity`
    pub fn for_player(player: Arc<Player>) -> Self {
        let capacity = player.config().history_capacity;
        Self::new(player, capacity)
    }

    pub fn player(&self) -> &Arc<Player> {
        &self.player
    }

    /// Run `command`, recording it if it was applied
    ///
    /// Errors from the command propagate unchanged and nothing is recorded.
    pub fn execute(&mut self, command: Command) -> Result<CommandOutcome> {
        let outcome = command.apply(&self.player)?;

        match &outcome {
            CommandOutcome::Applied { inverse } => {
                debug!(command = command.name(), "Command applied");
                let inverse = inverse.clone();
                if let Some(evicted) = self.history.push(Executed { command, inverse }) {
                    debug!(command = evicted.command.name(), "Evicted oldest history entry");
                }
            }
            CommandOutcome::Rejected(reason) => {
                debug!(command = command.name(), %reason, "Command rejected");
            }
        }

        Ok(outcome)
    }

    /// Pop the most recent command and run its inverse
    ///
    /// Returns `None` when the history is empty. A command without an
    /// inverse is popped and its undo is a no-op. The inverse itself is not
    /// recorded.
    pub fn undo(&mut self) -> Result<Option<CommandOutcome>> {
        let Some(entry) = self.history.pop() else {
            return Ok(None);
        };

        match entry.inverse {
            Some(inverse) => {
                debug!(
                    command = entry.command.name(),
                    inverse = inverse.name(),
                    "Undoing command"
                );
                inverse.apply(&self.player).map(Some)
            }
            None => Ok(Some(CommandOutcome::Rejected(Rejection::NothingToDo))),
        }
    }

    /// Recorded commands, oldest first
    pub fn history(&self) -> impl Iterator<Item = &Executed> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn capacity(&self) -> usize {
        self.history.capacity()
    }
}
