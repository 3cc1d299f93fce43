//! Song probing
//!
//! Builds [`Song`] metadata from an MP3 file by walking its packets once:
//! frame count from the packet count, duration from the sample count.
//! [`FileLibrary`] groups probed files into named playlists and serves them
//! through [`MetadataProvider`].

use crate::decoder::probe_location;
use crate::error::{AudioError, Result};
use lyra_core::{AudioLocation, MetadataProvider, Playlist, Song, SongId};
use std::path::Path;
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::meta::{MetadataRevision, StandardTagKey};
use tracing::{debug, warn};

/// Probe one file into a [`Song`]
///
/// Title and artist come from the stream's tags when present, otherwise
/// from the file name.
pub fn probe_song(path: impl AsRef<Path>, id: impl Into<SongId>) -> Result<Song> {
    let path = path.as_ref();
    let location = AudioLocation::file(path);
    let mut probed = probe_location(&location)?;

    let mut title = None;
    let mut artist = None;
    let mut read_tags = |revision: &MetadataRevision| {
        for tag in revision.tags() {
            match tag.std_key {
                Some(StandardTagKey::TrackTitle) => title = Some(tag.value.to_string()),
                Some(StandardTagKey::Artist) => artist = Some(tag.value.to_string()),
                _ => {}
            }
        }
    };
    if let Some(metadata) = probed.metadata.get() {
        if let Some(revision) = metadata.current() {
            read_tags(revision);
        }
    }
    if let Some(revision) = probed.format.metadata().current() {
        read_tags(revision);
    }

    let reader = &mut probed.format;
    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::Probe("no audio track found".into()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AudioError::Probe("unknown sample rate".into()))?;

    let mut frames = 0u64;
    let mut samples = 0u64;
    loop {
        match reader.next_packet() {
            Ok(packet) if packet.track_id() == track_id => {
                frames += 1;
                samples += packet.dur;
            }
            Ok(_) => {}
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        }
    }

    if frames == 0 {
        return Err(AudioError::Probe(format!("{} has no audio frames", path.display())));
    }

    let duration_ms = samples * 1_000 / u64::from(sample_rate);
    let fallback_title = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Unknown")
        .to_string();

    debug!(path = %path.display(), frames, duration_ms, "Probed song");

    Ok(Song::new(
        id,
        title.unwrap_or(fallback_title),
        artist.unwrap_or_else(|| "Unknown Artist".to_string()),
        duration_ms,
        frames,
        location,
    ))
}

/// Local MP3 files probed into named playlists
#[derive(Debug, Clone, Default)]
pub struct FileLibrary {
    playlists: Vec<Playlist>,
}

impl FileLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe `paths` into playlist `name`, replacing one of the same name
    ///
    /// Song ids are `name:position`, counting from 1, so they stay unique
    /// across playlists.
    ///
    /// # Errors
    /// Fails on the first unreadable file
    pub fn add<P: AsRef<Path>>(&mut self, name: &str, paths: &[P]) -> Result<&Playlist> {
        let songs = paths
            .iter()
            .enumerate()
            .map(|(i, path)| {
                probe_song(path, format!("{name}:{}", i + 1)).map_err(|e| {
                    warn!(path = %path.as_ref().display(), error = %e, "Failed to probe song");
                    e
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.playlists.retain(|p| p.name != name);
        self.playlists.push(Playlist::new(name, songs));
        Ok(&self.playlists[self.playlists.len() - 1])
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }
}

impl MetadataProvider for FileLibrary {
    fn song(&self, id: &SongId) -> lyra_core::Result<Song> {
        self.playlists.song(id)
    }

    fn playlist(&self, id: &str) -> lyra_core::Result<Playlist> {
        self.playlists.playlist(id)
    }
}
