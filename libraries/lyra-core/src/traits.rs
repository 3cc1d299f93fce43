/// Collaborator traits for Lyra
///
/// The engine consumes these; implementations live with whoever owns the
/// data (REST clients, local library scanners, test fixtures).
use crate::error::{LyraError, Result};
use crate::types::{ListenerId, ListenerRole, Playlist, Song, SongId};
use std::collections::HashMap;

/// Resolves song metadata and playlist composition
pub trait MetadataProvider: Send + Sync {
    /// Resolve a single song
    ///
    /// # Errors
    /// Returns `NotFound` if the song is unknown
    fn song(&self, id: &SongId) -> Result<Song>;

    /// Resolve a playlist by identifier
    ///
    /// # Errors
    /// Returns `NotFound` if the playlist is unknown
    fn playlist(&self, id: &str) -> Result<Playlist>;
}

/// Supplies the rotating set of advertisement clips
pub trait AdContentProvider: Send + Sync {
    /// All clips available for rotation, in rotation order
    fn ads(&self) -> Vec<Song>;
}

/// Supplies the role set of a listener
pub trait RoleProvider: Send + Sync {
    /// Roles currently held by `listener`
    fn roles(&self, listener: &ListenerId) -> Vec<ListenerRole>;
}

/// Fixed list of advertisement clips
#[derive(Debug, Clone, Default)]
pub struct StaticAdContent {
    clips: Vec<Song>,
}

impl StaticAdContent {
    pub fn new(clips: Vec<Song>) -> Self {
        Self { clips }
    }
}

impl AdContentProvider for StaticAdContent {
    fn ads(&self) -> Vec<Song> {
        self.clips.clone()
    }
}

/// Fixed listener → roles mapping
///
/// Unknown listeners are treated as free-tier.
#[derive(Debug, Clone, Default)]
pub struct StaticRoles {
    roles: HashMap<ListenerId, Vec<ListenerRole>>,
}

impl StaticRoles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style role assignment
    pub fn with(mut self, listener: impl Into<String>, roles: Vec<ListenerRole>) -> Self {
        self.roles.insert(ListenerId::new(listener), roles);
        self
    }
}

impl RoleProvider for StaticRoles {
    fn roles(&self, listener: &ListenerId) -> Vec<ListenerRole> {
        self.roles
            .get(listener)
            .cloned()
            .unwrap_or_else(|| vec![ListenerRole::Free])
    }
}

/// In-memory metadata catalogue
impl MetadataProvider for Vec<Playlist> {
    fn song(&self, id: &SongId) -> Result<Song> {
        self.iter()
            .flat_map(|p| p.songs.iter())
            .find(|s| &s.id == id)
            .cloned()
            .ok_or_else(|| LyraError::song_not_found(id.as_str()))
    }

    fn playlist(&self, id: &str) -> Result<Playlist> {
        self.iter()
            .find(|p| p.name == id)
            .cloned()
            .ok_or_else(|| LyraError::playlist_not_found(id))
    }
}
