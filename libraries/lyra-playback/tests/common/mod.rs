//! Shared helpers for player tests
//!
//! Scripted frame sources, a paced sink and an event recorder.

#![allow(dead_code)]

use lyra_core::{AudioLocation, ListenerRole, Playlist, Song, SongId, StaticAdContent, StaticRoles};
use lyra_playback::{
    AdCounter, AudioSink, AudioSinkFactory, FrameSource, FrameSourceOpener, PcmFrame,
    PlaybackError, Player, PlayerConfig, PlayerEvent, Result, Subscription,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Milliseconds per frame used by test songs (roughly MP3 at 44.1kHz)
pub const MS_PER_FRAME: u64 = 26;

pub const SAMPLES_PER_FRAME: usize = 64;

pub fn create_test_song(id: &str, frames: u64) -> Song {
    Song::new(
        id,
        format!("Song {id}"),
        "Test Artist",
        frames * MS_PER_FRAME,
        frames,
        AudioLocation::file(format!("/music/{id}.mp3")),
    )
}

pub fn create_test_playlist(count: usize, frames: u64) -> Playlist {
    Playlist::new(
        "test",
        (0..count).map(|i| create_test_song(&format!("s{i}"), frames)).collect(),
    )
}

/// Source producing `total` frames of a 1 kHz stereo tone
pub struct MockSource {
    total: u64,
    position: u64,
    fail_at: Option<u64>,
}

impl FrameSource for MockSource {
    fn decode_next_frame(&mut self) -> Result<Option<PcmFrame>> {
        if self.fail_at == Some(self.position) {
            return Err(PlaybackError::Decode(format!("corrupt frame {}", self.position)));
        }
        if self.position >= self.total {
            return Ok(None);
        }

        let offset = self.position as usize * SAMPLES_PER_FRAME;
        let mut samples = Vec::with_capacity(SAMPLES_PER_FRAME * 2);
        for i in 0..SAMPLES_PER_FRAME {
            let t = (offset + i) as f32 / 44_100.0;
            let s = 0.5 * (2.0 * std::f32::consts::PI * 1_000.0 * t).sin();
            samples.push(s);
            samples.push(s);
        }
        self.position += 1;
        Ok(Some(PcmFrame::new(samples, 2, 44_100)))
    }

    fn position(&self) -> u64 {
        self.position
    }
}

/// Opener keyed by song id, with scripted failures
#[derive(Default)]
pub struct MockOpener {
    fail_open: HashSet<SongId>,
    decode_errors: HashMap<SongId, u64>,
    opened: Mutex<Vec<SongId>>,
}

impl MockOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opening `id` fails with a resource error
    pub fn fail_open(mut self, id: &str) -> Self {
        self.fail_open.insert(SongId::new(id));
        self
    }

    /// Decoding `id` fails at `frame`
    pub fn decode_error(mut self, id: &str, frame: u64) -> Self {
        self.decode_errors.insert(SongId::new(id), frame);
        self
    }

    pub fn opened(&self) -> Vec<SongId> {
        self.opened.lock().clone()
    }
}

impl FrameSourceOpener for MockOpener {
    fn open(&self, song: &Song) -> Result<Box<dyn FrameSource>> {
        if self.fail_open.contains(&song.id) {
            return Err(PlaybackError::Resource(format!("cannot open {}", song.id)));
        }
        self.opened.lock().push(song.id.clone());
        Ok(Box::new(MockSource {
            total: song.total_frames,
            position: 0,
            fail_at: self.decode_errors.get(&song.id).copied(),
        }))
    }
}

/// Sink that sleeps per write, standing in for a device clock
#[derive(Clone)]
pub struct PacedSink {
    delay: Duration,
    written: Arc<AtomicU64>,
}

impl PacedSink {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            written: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Frames written so far, across every sink created
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::SeqCst)
    }
}

impl AudioSink for PacedSink {
    fn write(&mut self, _samples: &[f32], _channels: u16, _sample_rate: u32) -> Result<()> {
        self.written.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        Ok(())
    }
}

impl AudioSinkFactory for PacedSink {
    fn create(&self) -> Result<Box<dyn AudioSink>> {
        Ok(Box::new(self.clone()))
    }
}

/// Config for tests: no spectrum threads, fast progress
pub fn test_config() -> PlayerConfig {
    let mut config = PlayerConfig {
        progress_interval_ms: 10,
        ..PlayerConfig::default()
    };
    #[cfg(feature = "spectrum")]
    {
        config.spectrum_enabled = false;
    }
    config
}

pub struct Harness {
    pub player: Arc<Player>,
    pub opener: Arc<MockOpener>,
    pub sink: PacedSink,
    pub events: EventRecorder,
}

pub struct HarnessBuilder {
    opener: MockOpener,
    delay: Duration,
    config: PlayerConfig,
    ads: Vec<Song>,
    roles: Vec<ListenerRole>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            opener: MockOpener::new(),
            delay: Duration::ZERO,
            config: test_config(),
            ads: Vec::new(),
            roles: vec![ListenerRole::Free],
        }
    }

    pub fn opener(mut self, opener: MockOpener) -> Self {
        self.opener = opener;
        self
    }

    /// Sleep per frame written
    pub fn paced(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn ads(mut self, ads: Vec<Song>) -> Self {
        self.ads = ads;
        self
    }

    pub fn roles(mut self, roles: Vec<ListenerRole>) -> Self {
        self.roles = roles;
        self
    }

    pub fn build(self) -> Harness {
        let opener = Arc::new(self.opener);
        let sink = PacedSink::new(self.delay);
        let player = Player::builder(opener.clone(), Arc::new(sink.clone()))
            .config(self.config)
            .ads(Arc::new(StaticAdContent::new(self.ads)))
            .roles(Arc::new(StaticRoles::new().with("tester", self.roles)))
            .ad_counter(AdCounter::new())
            .listener("tester")
            .build()
            .expect("player should build");
        let player = Arc::new(player);
        let events = EventRecorder::attach(&player);

        Harness {
            player,
            opener,
            sink,
            events,
        }
    }
}

/// Records every event published by a player
pub struct EventRecorder {
    seen: Arc<Mutex<Vec<PlayerEvent>>>,
    _subscription: Subscription,
}

impl EventRecorder {
    pub fn attach(player: &Player) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = player.subscribe(move |event| sink.lock().push(event.clone()));
        Self {
            seen,
            _subscription: subscription,
        }
    }

    pub fn all(&self) -> Vec<PlayerEvent> {
        self.seen.lock().clone()
    }

    /// Events other than progress, spectrum and slider updates
    pub fn transport(&self) -> Vec<PlayerEvent> {
        self.all()
            .into_iter()
            .filter(|e| {
                !matches!(
                    e,
                    PlayerEvent::PlaybackProgress { .. }
                        | PlayerEvent::SpectrumData { .. }
                        | PlayerEvent::SliderDragging { .. }
                )
            })
            .collect()
    }

    /// Ids of every `SongLoaded` event, in order
    pub fn loaded_ids(&self) -> Vec<String> {
        self.all()
            .into_iter()
            .filter_map(|e| match e {
                PlayerEvent::SongLoaded { song } => Some(song.id.to_string()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.seen.lock().clear();
    }

    /// Poll until `pred` holds for the recorded events
    pub fn wait_until<F>(&self, timeout: Duration, pred: F) -> bool
    where
        F: Fn(&[PlayerEvent]) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if pred(&self.seen.lock()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(2));
        }
    }

    /// Wait for at least one event matching `pred`
    pub fn wait_for<F>(&self, timeout: Duration, pred: F) -> bool
    where
        F: Fn(&PlayerEvent) -> bool,
    {
        self.wait_until(timeout, |events| events.iter().any(&pred))
    }
}

/// Poll a condition until it holds or `timeout` passes
pub fn eventually<F: Fn() -> bool>(timeout: Duration, cond: F) -> bool {
    let deadline = Instant::now() + timeout;
    while !cond() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
    true
}
