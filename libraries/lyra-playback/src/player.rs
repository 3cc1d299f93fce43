//! Player state machine
//!
//! States: `Stopped` (initial), `Playing`, `Paused`, `AdPlaying`.
//!
//! Transport commands run on the caller's thread and return quickly; the
//! decode/output loop runs on a dedicated playback thread started by `play`
//! and halted by `pause`, `stop`, `load_*`, seeks and `dispose`. Halting
//! joins the thread (bounded by `join_timeout_ms`) before the command
//! returns, so no decode thread outlives a reload. A command issued from the
//! playback thread itself (an event subscriber) only raises the stop flag;
//! the thread exits as soon as the subscriber returns.
//!
//! Natural completion is handled on the playback thread itself: it counts
//! the completion for the ad gate, asks the navigator for the next song and
//! either continues with it or plays an advertisement first.

use crate::ad_gate::{AdCounter, AdGate};
use crate::command::{Command, CommandOutcome, Rejection};
use crate::config::PlayerConfig;
use crate::error::{PlaybackError, Result};
use crate::event_bus::{EventBus, Subscription};
use crate::events::PlayerEvent;
use crate::navigator::{NavStep, PlaylistNavigator};
use crate::source::{AudioSinkFactory, FrameSource, FrameSourceOpener};
use crate::types::{PlayerState, RepeatMode, SessionSnapshot};
use crate::volume::Volume;
use lyra_core::{
    AdContentProvider, JoinError, ListenerId, Playlist, RoleProvider, Song, StaticAdContent,
    StaticRoles, WorkerThread,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[cfg(feature = "spectrum")]
use lyra_spectrum::{SpectrumService, SpectrumTap};

/// Ad in progress and the song selection it interrupted
struct AdBreak {
    clip: Song,
    resume: NavStep,
}

/// Mutable playback session
struct Session {
    song: Option<Song>,
    state: PlayerState,
    volume: Volume,
    repeat: RepeatMode,
    navigator: PlaylistNavigator,
    ad: Option<AdBreak>,

    /// Open stream for `song`, positioned at or before the current frame
    prepared: Option<Box<dyn FrameSource>>,

    listener: ListenerId,
    ad_rotation: usize,

    /// Bumped whenever a playback thread is started or halted
    run_id: u64,
}

/// State shared with the playback thread
struct Shared {
    config: PlayerConfig,
    opener: Arc<dyn FrameSourceOpener>,
    sinks: Arc<dyn AudioSinkFactory>,
    ads: Arc<dyn AdContentProvider>,
    roles: Arc<dyn RoleProvider>,
    gate: AdGate,
    bus: EventBus,
    session: Mutex<Session>,

    /// Current frame, readable without the session lock
    frame: AtomicU64,

    /// Linear output gain as `f32` bits
    gain_bits: AtomicU32,

    #[cfg(feature = "spectrum")]
    tap: Option<SpectrumTap>,
}

struct Worker {
    stop: Arc<AtomicBool>,
    thread: WorkerThread<Option<Box<dyn FrameSource>>>,
}

/// Owned by whoever holds the command lock
struct Control {
    worker: Option<Worker>,
    #[cfg(feature = "spectrum")]
    spectrum: Option<SpectrumService>,
    disposed: bool,
}

/// Identifies one playback thread run
struct RunCtx {
    run_id: u64,
    stop: Arc<AtomicBool>,
}

impl RunCtx {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

/// What the playback thread does after a stream ends
enum Continuation {
    Play {
        song: Song,
        source: Box<dyn FrameSource>,
        ad: bool,
    },
    Halt,
}

/// Playback engine
///
/// All methods take `&self`; share the player across threads with `Arc`.
/// Commands are serialized internally.
pub struct Player {
    shared: Arc<Shared>,
    control: Mutex<Control>,
}

/// Builder for [`Player`]
pub struct PlayerBuilder {
    config: PlayerConfig,
    opener: Arc<dyn FrameSourceOpener>,
    sinks: Arc<dyn AudioSinkFactory>,
    ads: Arc<dyn AdContentProvider>,
    roles: Arc<dyn RoleProvider>,
    counter: AdCounter,
    listener: ListenerId,
    bus: EventBus,
}

impl PlayerBuilder {
    pub fn config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn ads(mut self, ads: Arc<dyn AdContentProvider>) -> Self {
        self.ads = ads;
        self
    }

    pub fn roles(mut self, roles: Arc<dyn RoleProvider>) -> Self {
        self.roles = roles;
        self
    }

    /// Use a private counter map instead of the process-wide one
    pub fn ad_counter(mut self, counter: AdCounter) -> Self {
        self.counter = counter;
        self
    }

    pub fn listener(mut self, listener: impl Into<ListenerId>) -> Self {
        self.listener = listener.into();
        self
    }

    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    /// Validate the configuration and start the spectrum threads
    ///
    /// # Errors
    /// `InvalidOperation` for a bad configuration, `ThreadLifecycle` if the
    /// spectrum threads cannot start.
    pub fn build(self) -> Result<Player> {
        self.config
            .validate()
            .map_err(|e| PlaybackError::InvalidOperation(format!("invalid player config: {e}")))?;

        let volume = Volume::new(
            self.config.initial_volume,
            self.config.volume_min,
            self.config.volume_max,
        );

        #[cfg(feature = "spectrum")]
        let spectrum = if self.config.spectrum_enabled {
            let bus = self.bus.clone();
            let service = SpectrumService::start(
                self.config.spectrum.clone(),
                Duration::from_millis(self.config.join_timeout_ms),
                move |frame| {
                    bus.publish(PlayerEvent::SpectrumData {
                        bars: frame.bars,
                        peaks: frame.peaks,
                    });
                },
            )
            .map_err(|e| PlaybackError::ThreadLifecycle(e.to_string()))?;
            Some(service)
        } else {
            None
        };

        let session = Session {
            song: None,
            state: PlayerState::Stopped,
            repeat: self.config.repeat,
            navigator: PlaylistNavigator::new(),
            ad: None,
            prepared: None,
            listener: self.listener,
            ad_rotation: 0,
            run_id: 0,
            volume: volume.clone(),
        };

        let shared = Arc::new(Shared {
            gate: AdGate::new(self.config.ad_threshold, self.counter),
            opener: self.opener,
            sinks: self.sinks,
            ads: self.ads,
            roles: self.roles,
            bus: self.bus,
            session: Mutex::new(session),
            frame: AtomicU64::new(0),
            gain_bits: AtomicU32::new(volume.gain().to_bits()),
            #[cfg(feature = "spectrum")]
            tap: spectrum.as_ref().map(SpectrumService::tap),
            config: self.config,
        });

        Ok(Player {
            shared,
            control: Mutex::new(Control {
                worker: None,
                #[cfg(feature = "spectrum")]
                spectrum,
                disposed: false,
            }),
        })
    }
}

impl Player {
    /// Start building a player around a decoder and an output
    pub fn builder(
        opener: Arc<dyn FrameSourceOpener>,
        sinks: Arc<dyn AudioSinkFactory>,
    ) -> PlayerBuilder {
        PlayerBuilder {
            config: PlayerConfig::default(),
            opener,
            sinks,
            ads: Arc::new(StaticAdContent::default()),
            roles: Arc::new(StaticRoles::new()),
            counter: AdCounter::global(),
            listener: ListenerId::new("anonymous"),
            bus: EventBus::new(),
        }
    }

    // ===== Queries =====

    pub fn config(&self) -> &PlayerConfig {
        &self.shared.config
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.bus
    }

    /// Shorthand for `events().subscribe(..)`
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.shared.bus.subscribe(callback)
    }

    pub fn state(&self) -> PlayerState {
        self.shared.session.lock().state
    }

    /// Current frame (lock-free)
    pub fn current_frame(&self) -> u64 {
        self.shared.frame.load(Ordering::Acquire)
    }

    pub fn current_song(&self) -> Option<Song> {
        self.shared.session.lock().song.clone()
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.shared.session.lock().repeat
    }

    pub fn volume_db(&self) -> f32 {
        self.shared.session.lock().volume.db()
    }

    pub fn ad_gate(&self) -> &AdGate {
        &self.shared.gate
    }

    pub fn listener(&self) -> ListenerId {
        self.shared.session.lock().listener.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let session = self.shared.session.lock();
        let frame = self.current_frame();
        SessionSnapshot {
            elapsed_ms: session.song.as_ref().map_or(0, |s| s.ms_for_frame(frame)),
            song: session.song.clone(),
            state: session.state,
            frame,
            volume_db: session.volume.db(),
            repeat: session.repeat,
            ad_active: session.ad.is_some(),
            playlist_position: session.navigator.current_index(),
            playlist_len: session.navigator.len(),
            shuffle_active: session.navigator.is_shuffled(),
            listener: session.listener.clone(),
        }
    }

    // ===== Commands =====

    /// Replace the session with a single song, leaving the player Stopped
    ///
    /// # Errors
    /// `Resource` if the song's stream cannot be opened. The player is then
    /// Stopped and keeps its previous song.
    pub fn load_song(&self, song: Song) -> Result<CommandOutcome> {
        self.run(|control, shared, events| {
            control.halt_to_stopped(shared, events);
            let source = shared.opener.open(&song)?;

            let mut session = shared.session.lock();
            let had_playlist = session.navigator.playlist().is_some();
            session.navigator.load_song(song.clone());
            session.song = Some(song.clone());
            session.prepared = Some(source);
            shared.frame.store(0, Ordering::Release);

            info!(song = %song.id, title = %song.title, "Song loaded");
            if had_playlist {
                events.push(PlayerEvent::PlaylistLoaded { playlist: None });
            }
            events.push(PlayerEvent::SongLoaded { song });
            Ok(CommandOutcome::applied())
        })
    }

    /// Replace the session with a playlist, positioned on its first song
    ///
    /// # Errors
    /// `Resource` if the first song's stream cannot be opened.
    pub fn load_playlist(&self, playlist: Playlist) -> Result<CommandOutcome> {
        let Some(first) = playlist.get(0).cloned() else {
            return Ok(Rejection::NothingToDo.into());
        };

        self.run(|control, shared, events| {
            control.halt_to_stopped(shared, events);
            let source = shared.opener.open(&first)?;

            let mut session = shared.session.lock();
            session.navigator.load_playlist(playlist.clone());
            session.song = Some(first.clone());
            session.prepared = Some(source);
            shared.frame.store(0, Ordering::Release);

            info!(playlist = %playlist.name, songs = playlist.len(), "Playlist loaded");
            events.push(PlayerEvent::PlaylistLoaded {
                playlist: Some(playlist),
            });
            events.push(PlayerEvent::SongLoaded { song: first });
            Ok(CommandOutcome::applied())
        })
    }

    /// Stopped|Paused → Playing
    pub fn play(&self) -> Result<CommandOutcome> {
        self.run(|control, shared, events| {
            match shared.peek_state() {
                (_, false) => return Ok(Rejection::NoSongLoaded.into()),
                (PlayerState::AdPlaying, _) => return Ok(Rejection::AdPlaying.into()),
                (PlayerState::Playing, _) => {
                    return Ok(Rejection::InvalidState(PlayerState::Playing).into())
                }
                _ => {}
            }

            let leftover = control.halt_worker(shared);
            let mut session = shared.session.lock();
            let Some(song) = session.song.clone() else {
                return Ok(Rejection::NoSongLoaded.into());
            };

            let frame = song.clamp_frame(shared.frame.load(Ordering::Acquire));
            let source = shared.reusable_source(session.prepared.take().or(leftover), &song, frame)?;

            control.start_worker(shared, &mut session, source, song, false)?;
            session.state = PlayerState::Playing;
            debug!(frame, "Playback started");
            events.push(PlayerEvent::PlaybackStarted);
            Ok(CommandOutcome::applied_with(Command::Pause))
        })
    }

    /// Playing → Paused, keeping the position
    pub fn pause(&self) -> Result<CommandOutcome> {
        self.run(|control, shared, events| {
            match shared.peek_state() {
                (_, false) => return Ok(Rejection::NoSongLoaded.into()),
                (PlayerState::AdPlaying, _) => return Ok(Rejection::AdPlaying.into()),
                (PlayerState::Playing, _) => {}
                (state, _) => return Ok(Rejection::InvalidState(state).into()),
            }

            let source = control.halt_worker(shared);
            let mut session = shared.session.lock();
            if session.state != PlayerState::Playing {
                // Finished on its own while we were halting it
                return Ok(Rejection::InvalidState(session.state).into());
            }

            session.prepared = source;
            session.state = PlayerState::Paused;
            debug!(frame = shared.frame.load(Ordering::Acquire), "Playback paused");
            events.push(PlayerEvent::PlaybackPaused);
            Ok(CommandOutcome::applied_with(Command::Play))
        })
    }

    /// Any state → Stopped, position reset to 0
    pub fn stop(&self) -> Result<CommandOutcome> {
        self.run(|control, shared, events| {
            match shared.peek_state() {
                (_, false) => return Ok(Rejection::NoSongLoaded.into()),
                (PlayerState::Stopped, _) if shared.frame.load(Ordering::Acquire) == 0 => {
                    return Ok(Rejection::NothingToDo.into())
                }
                _ => {}
            }

            control.halt_worker(shared);
            let mut session = shared.session.lock();
            shared.interrupt_ad(&mut session, events);
            session.prepared = None;
            session.state = PlayerState::Stopped;
            shared.frame.store(0, Ordering::Release);
            shared.reset_spectrum();

            debug!("Playback stopped");
            events.push(PlayerEvent::PlaybackStopped);
            Ok(CommandOutcome::applied())
        })
    }

    /// Move to the next song according to the repeat mode
    ///
    /// Keeps playing if the player was playing. Without repeat, `next` on the
    /// last song stops playback and publishes `PlaybackFinished`.
    pub fn next(&self) -> Result<CommandOutcome> {
        self.navigate(|nav, mode| nav.peek_next(mode), Command::Previous)
    }

    /// Move to the previous song (repeat-one behaves as repeat-all)
    pub fn previous(&self) -> Result<CommandOutcome> {
        self.navigate(|nav, mode| nav.peek_previous(mode), Command::Next)
    }

    fn navigate<F>(&self, select: F, inverse: Command) -> Result<CommandOutcome>
    where
        F: FnOnce(&PlaylistNavigator, RepeatMode) -> NavStep,
    {
        self.run(|control, shared, events| {
            match shared.peek_state() {
                (_, false) => return Ok(Rejection::NoSongLoaded.into()),
                (PlayerState::AdPlaying, _) => return Ok(Rejection::AdPlaying.into()),
                _ => {}
            }

            control.halt_worker(shared);
            let mut session = shared.session.lock();
            let before = session.state;
            let old_cursor = session.navigator.cursor();
            let step = select(&session.navigator, session.repeat);

            match step {
                NavStep::Load { cursor, ref song } => {
                    let source = match shared.opener.open(song) {
                        Ok(source) => source,
                        Err(e) => {
                            if before == PlayerState::Playing {
                                session.state = PlayerState::Stopped;
                                events.push(PlayerEvent::PlaybackStopped);
                            }
                            return Err(e);
                        }
                    };

                    let song = song.clone();
                    session.navigator.commit(&step);
                    session.song = Some(song.clone());
                    session.prepared = None;
                    shared.frame.store(0, Ordering::Release);
                    info!(song = %song.id, title = %song.title, "Song selected");
                    events.push(PlayerEvent::SongLoaded { song: song.clone() });

                    if before == PlayerState::Playing {
                        control.start_worker(shared, &mut session, source, song, false)?;
                    } else {
                        session.prepared = Some(source);
                    }

                    let moved = cursor != old_cursor;
                    Ok(if moved {
                        CommandOutcome::applied_with(inverse)
                    } else {
                        CommandOutcome::applied()
                    })
                }
                NavStep::Finished => {
                    session.prepared = None;
                    session.state = PlayerState::Stopped;
                    shared.frame.store(0, Ordering::Release);
                    info!("Reached end of playlist");
                    events.push(PlayerEvent::PlaybackFinished);
                    Ok(CommandOutcome::applied())
                }
            }
        })
    }

    /// Rewind by `replay_window_ms`, never below frame 0
    pub fn replay_five_seconds(&self) -> Result<CommandOutcome> {
        let (state, song) = {
            let session = self.shared.session.lock();
            (session.state, session.song.clone())
        };
        let Some(song) = song else {
            return Ok(Rejection::NoSongLoaded.into());
        };
        match state {
            PlayerState::AdPlaying => return Ok(Rejection::AdPlaying.into()),
            PlayerState::Stopped => return Ok(Rejection::InvalidState(state).into()),
            PlayerState::Playing | PlayerState::Paused => {}
        }

        let window = song.frames_for_ms(self.shared.config.replay_window_ms);
        let target = self.current_frame().saturating_sub(window);
        self.seek_to_frame(target)
    }

    /// Move to `frame`, clamped into the song
    ///
    /// While playing, the playback thread is halted, repositioned and
    /// restarted, so progress never races the seek.
    pub fn seek_to_frame(&self, frame: u64) -> Result<CommandOutcome> {
        self.run(|control, shared, events| {
            match shared.peek_state() {
                (_, false) => return Ok(Rejection::NoSongLoaded.into()),
                (PlayerState::AdPlaying, _) => return Ok(Rejection::AdPlaying.into()),
                _ => {}
            }

            let leftover = control.halt_worker(shared);
            let mut session = shared.session.lock();
            let Some(song) = session.song.clone() else {
                return Ok(Rejection::NoSongLoaded.into());
            };

            let previous = shared.frame.load(Ordering::Acquire);
            let target = song.clamp_frame(frame);
            shared.frame.store(target, Ordering::Release);
            let candidate = session.prepared.take().or(leftover);

            if session.state == PlayerState::Playing {
                let source = match shared.reusable_source(candidate, &song, target) {
                    Ok(source) => source,
                    Err(e) => {
                        session.state = PlayerState::Stopped;
                        events.push(PlayerEvent::PlaybackStopped);
                        return Err(e);
                    }
                };
                control.start_worker(shared, &mut session, source, song.clone(), false)?;
            } else {
                session.prepared = candidate.filter(|s| s.position() <= target);
            }

            debug!(from = previous, to = target, "Seek");
            events.push(PlayerEvent::PlaybackProgress {
                frame: target,
                ms: song.ms_for_frame(target),
            });
            Ok(CommandOutcome::applied_with(Command::SeekToFrame(previous)))
        })
    }

    /// Seek by time, converting with the song's frame rate
    pub fn seek_to_time_ms(&self, ms: u64) -> Result<CommandOutcome> {
        let Some(song) = self.current_song() else {
            return Ok(Rejection::NoSongLoaded.into());
        };
        self.seek_to_frame(song.frames_for_ms(ms))
    }

    /// Publish a scrub preview without moving playback
    pub fn drag_slider(&self, frame: u64) -> Result<CommandOutcome> {
        self.run(|_, shared, events| {
            let session = shared.session.lock();
            if session.state == PlayerState::AdPlaying {
                return Ok(Rejection::AdPlaying.into());
            }
            let Some(song) = session.song.as_ref() else {
                return Ok(Rejection::NoSongLoaded.into());
            };
            let frame = song.clamp_frame(frame);
            events.push(PlayerEvent::SliderDragging {
                frame,
                ms: song.ms_for_frame(frame),
            });
            Ok(CommandOutcome::applied())
        })
    }

    /// Randomize the songs after the current one
    pub fn shuffle_playlist(&self) -> Result<CommandOutcome> {
        self.run(|_, shared, _| {
            let mut session = shared.session.lock();
            if session.song.is_none() {
                return Ok(Rejection::NoSongLoaded.into());
            }
            if session.state == PlayerState::AdPlaying {
                return Ok(Rejection::AdPlaying.into());
            }
            if !session.navigator.shuffle_remaining(&mut rand::thread_rng()) {
                return Ok(Rejection::NothingToDo.into());
            }
            info!(remaining = session.navigator.upcoming().count(), "Playlist shuffled");
            Ok(CommandOutcome::applied())
        })
    }

    /// Set volume in dB, clamped to the configured range
    pub fn set_volume(&self, db: f32) -> Result<CommandOutcome> {
        self.run(|_, shared, events| {
            let mut session = shared.session.lock();
            if session.state == PlayerState::AdPlaying {
                return Ok(Rejection::AdPlaying.into());
            }
            let previous = session.volume.db();
            let applied = session.volume.set_db(db);
            if applied == previous {
                return Ok(Rejection::NothingToDo.into());
            }
            shared
                .gain_bits
                .store(session.volume.gain().to_bits(), Ordering::Release);

            debug!(db = applied, "Volume changed");
            events.push(PlayerEvent::VolumeChanged { gain: applied });
            Ok(CommandOutcome::applied_with(Command::SetVolume(previous)))
        })
    }

    pub fn set_repeat_mode(&self, mode: RepeatMode) -> Result<CommandOutcome> {
        self.run(|_, shared, events| {
            let mut session = shared.session.lock();
            let previous = session.repeat;
            if previous == mode {
                return Ok(Rejection::NothingToDo.into());
            }
            session.repeat = mode;

            debug!(%mode, "Repeat mode changed");
            events.push(PlayerEvent::RepeatModeChanged { mode });
            Ok(CommandOutcome::applied_with(Command::SetRepeatMode(previous)))
        })
    }

    /// Stop every thread and release the open stream
    ///
    /// Thread problems are logged, never returned. Further commands fail
    /// with `InvalidOperation`. Also runs on drop.
    pub fn dispose(&self) {
        let mut events = Vec::new();
        {
            let mut control = self.control.lock();
            if control.disposed {
                return;
            }
            control.disposed = true;
            control.halt_to_stopped(&self.shared, &mut events);

            #[cfg(feature = "spectrum")]
            if let Some(mut spectrum) = control.spectrum.take() {
                spectrum.shutdown();
            }

            self.shared.session.lock().prepared = None;
            info!("Player disposed");
        }
        for event in events {
            self.shared.bus.publish(event);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.control.lock().disposed
    }

    /// Run a command under the command lock, then publish its events
    ///
    /// Events go out after every lock is released so subscribers may call
    /// back into the player.
    fn run<F>(&self, op: F) -> Result<CommandOutcome>
    where
        F: FnOnce(&mut Control, &Arc<Shared>, &mut Vec<PlayerEvent>) -> Result<CommandOutcome>,
    {
        let mut events = Vec::new();
        let result = {
            let mut control = self.control.lock();
            if control.disposed {
                Err(PlaybackError::InvalidOperation("player disposed".into()))
            } else {
                op(&mut control, &self.shared, &mut events)
            }
        };
        for event in events {
            self.shared.bus.publish(event);
        }
        result
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Control {
    /// Signal the playback thread and wait for it
    ///
    /// Returns the stream it was decoding when it was interrupted mid-song.
    fn halt_worker(&mut self, shared: &Shared) -> Option<Box<dyn FrameSource>> {
        let worker = self.worker.take()?;
        worker.stop.store(true, Ordering::Release);
        // Completion handling checks run_id, so a late thread cannot commit
        shared.session.lock().run_id += 1;

        let timeout = Duration::from_millis(shared.config.join_timeout_ms);
        match worker.thread.join_timeout(timeout) {
            Ok(source) => source,
            Err(JoinError::OwnThread) => {
                // Exits on the stop flag once the subscriber returns; its
                // stream is dropped and a resume reopens the song
                debug!("Playback halted from its own thread");
                None
            }
            Err(e) => {
                error!(error = %e, "Playback thread did not stop cleanly");
                None
            }
        }
    }

    /// Halt playback and move to Stopped, ending any ad break
    fn halt_to_stopped(&mut self, shared: &Shared, events: &mut Vec<PlayerEvent>) {
        self.halt_worker(shared);
        let mut session = shared.session.lock();
        shared.interrupt_ad(&mut session, events);
        if session.state != PlayerState::Stopped {
            session.state = PlayerState::Stopped;
            events.push(PlayerEvent::PlaybackStopped);
        }
        session.prepared = None;
        shared.reset_spectrum();
    }

    fn start_worker(
        &mut self,
        shared: &Arc<Shared>,
        session: &mut Session,
        source: Box<dyn FrameSource>,
        song: Song,
        ad: bool,
    ) -> Result<()> {
        session.run_id += 1;
        let stop = Arc::new(AtomicBool::new(false));
        let run = RunCtx {
            run_id: session.run_id,
            stop: Arc::clone(&stop),
        };
        let start_frame = shared.frame.load(Ordering::Acquire);
        let shared = Arc::clone(shared);

        let thread = WorkerThread::spawn("lyra-playback", move || {
            playback_thread(&shared, &run, source, song, ad, start_frame)
        })
        .map_err(|e| PlaybackError::ThreadLifecycle(e.to_string()))?;

        self.worker = Some(Worker { stop, thread });
        Ok(())
    }
}

impl Shared {
    /// (state, song loaded)
    fn peek_state(&self) -> (PlayerState, bool) {
        let session = self.session.lock();
        (session.state, session.song.is_some())
    }

    fn gain(&self) -> f32 {
        f32::from_bits(self.gain_bits.load(Ordering::Acquire))
    }

    fn reset_spectrum(&self) {
        #[cfg(feature = "spectrum")]
        if let Some(tap) = &self.tap {
            tap.reset();
        }
    }

    /// Reuse `candidate` if it has not read past `frame`, else reopen
    fn reusable_source(
        &self,
        candidate: Option<Box<dyn FrameSource>>,
        song: &Song,
        frame: u64,
    ) -> Result<Box<dyn FrameSource>> {
        match candidate {
            Some(source) if source.position() <= frame => Ok(source),
            _ => self.opener.open(song),
        }
    }

    /// End an ad break early; the ad stays owed to the listener
    fn interrupt_ad(&self, session: &mut Session, events: &mut Vec<PlayerEvent>) {
        let Some(ad) = session.ad.take() else { return };

        self.gate.defer(&session.listener);
        session.song = match ad.resume {
            NavStep::Load { song, .. } => Some(song),
            NavStep::Finished => session.navigator.current().cloned(),
        };
        info!(clip = %ad.clip.id, "Advertisement interrupted");
        events.push(PlayerEvent::AdOff);
    }

    /// Advance the frame counter after one decoded frame
    fn advance_frame(&self, total_frames: u64) -> u64 {
        let next = (self.frame.load(Ordering::Acquire) + 1).min(total_frames);
        self.frame.store(next, Ordering::Release);
        next
    }

    /// Decide what follows the end of a stream
    fn on_stream_end(&self, run: &RunCtx, song: &Song, was_ad: bool) -> Continuation {
        let mut events = Vec::new();
        let next = {
            let mut session = self.session.lock();
            if session.run_id != run.run_id || run.stopped() {
                return Continuation::Halt;
            }
            if was_ad {
                self.finish_ad(&mut session, &mut events)
            } else {
                self.finish_song(&mut session, song, &mut events)
            }
        };
        for event in events {
            self.bus.publish(event);
        }
        next
    }

    fn finish_song(
        &self,
        session: &mut Session,
        song: &Song,
        events: &mut Vec<PlayerEvent>,
    ) -> Continuation {
        let frame = self.frame.load(Ordering::Acquire);
        let step = session.navigator.peek_completion(session.repeat);
        session.navigator.commit(&step);

        if song.is_finished_at(frame, self.config.finished_ratio) {
            let listener = session.listener.clone();
            let count = self.gate.update_counter(&listener);
            debug!(song = %song.id, %listener, count, "Song completed");

            let roles = self.roles.roles(&listener);
            if self.gate.should_show_ad(&listener, &roles) {
                if let Some(next) = self.begin_ad(session, &step, events) {
                    return next;
                }
            }
        } else {
            debug!(
                song = %song.id,
                frame,
                total = song.total_frames,
                "Song ended before completion threshold"
            );
        }

        self.enter_step(session, step, events)
    }

    /// Start a rotating ad clip; `None` if no clip could be played
    fn begin_ad(
        &self,
        session: &mut Session,
        resume: &NavStep,
        events: &mut Vec<PlayerEvent>,
    ) -> Option<Continuation> {
        let listener = session.listener.clone();
        let clips = self.ads.ads();
        if clips.is_empty() {
            warn!(%listener, "Advertisement due but no clips available, skipping");
            self.gate.reset_counter(&listener);
            return None;
        }

        let clip = clips[session.ad_rotation % clips.len()].clone();
        session.ad_rotation = session.ad_rotation.wrapping_add(1);

        match self.opener.open(&clip) {
            Ok(source) => {
                info!(%listener, clip = %clip.id, "Starting advertisement");
                self.frame.store(0, Ordering::Release);
                session.state = PlayerState::AdPlaying;
                session.song = Some(clip.clone());
                session.ad = Some(AdBreak {
                    clip: clip.clone(),
                    resume: resume.clone(),
                });
                events.push(PlayerEvent::AdOn { clip: clip.clone() });
                Some(Continuation::Play {
                    song: clip,
                    source,
                    ad: true,
                })
            }
            Err(e) => {
                warn!(clip = %clip.id, error = %e, "Failed to open advertisement, skipping");
                self.gate.reset_counter(&listener);
                None
            }
        }
    }

    fn finish_ad(&self, session: &mut Session, events: &mut Vec<PlayerEvent>) -> Continuation {
        self.gate.reset_counter(&session.listener);
        let resume = session
            .ad
            .take()
            .map_or(NavStep::Finished, |ad| ad.resume);
        session.state = PlayerState::Playing;
        info!("Advertisement finished");
        events.push(PlayerEvent::AdOff);
        self.enter_step(session, resume, events)
    }

    fn enter_step(
        &self,
        session: &mut Session,
        step: NavStep,
        events: &mut Vec<PlayerEvent>,
    ) -> Continuation {
        self.frame.store(0, Ordering::Release);

        match step {
            NavStep::Load { song, .. } => match self.opener.open(&song) {
                Ok(source) => {
                    info!(song = %song.id, title = %song.title, "Now playing");
                    session.song = Some(song.clone());
                    session.state = PlayerState::Playing;
                    events.push(PlayerEvent::SongLoaded { song: song.clone() });
                    Continuation::Play {
                        song,
                        source,
                        ad: false,
                    }
                }
                Err(e) => {
                    error!(song = %song.id, error = %e, "Failed to open next song, stopping");
                    session.song = Some(song);
                    session.state = PlayerState::Stopped;
                    events.push(PlayerEvent::PlaybackStopped);
                    Continuation::Halt
                }
            },
            NavStep::Finished => {
                info!("Playback finished");
                session.song = session.navigator.current().cloned();
                session.state = PlayerState::Stopped;
                events.push(PlayerEvent::PlaybackFinished);
                Continuation::Halt
            }
        }
    }

    /// Stop after an output failure
    fn abort_run(&self, run: &RunCtx) {
        let mut events = Vec::new();
        {
            let mut session = self.session.lock();
            if session.run_id != run.run_id || run.stopped() {
                return;
            }
            self.interrupt_ad(&mut session, &mut events);
            session.state = PlayerState::Stopped;
            self.frame.store(0, Ordering::Release);
            events.push(PlayerEvent::PlaybackStopped);
        }
        for event in events {
            self.bus.publish(event);
        }
    }
}

/// Outcome of one decode step
enum Decoded {
    Frame(crate::source::PcmFrame),
    End,
}

/// Decode/output loop
///
/// Returns the open stream when interrupted so a resume can continue from
/// it; returns `None` when playback ended on its own.
fn playback_thread(
    shared: &Shared,
    run: &RunCtx,
    mut source: Box<dyn FrameSource>,
    mut song: Song,
    mut is_ad: bool,
    start_frame: u64,
) -> Option<Box<dyn FrameSource>> {
    let mut sink = match shared.sinks.create() {
        Ok(sink) => sink,
        Err(e) => {
            error!(error = %e, "Failed to open audio output");
            shared.abort_run(run);
            return Some(source);
        }
    };

    if source.position() < start_frame {
        let wanted = start_frame - source.position();
        match source.skip_frames(wanted) {
            Ok(skipped) if skipped < wanted => {
                debug!(wanted, skipped, "Stream ended while seeking");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Decode error while seeking"),
        }
    }

    let interval = Duration::from_millis(shared.config.progress_interval_ms);
    let mut last_progress: Option<Instant> = None;

    loop {
        if run.stopped() {
            return Some(source);
        }

        let decoded = match source.decode_next_frame() {
            Ok(Some(frame)) => Decoded::Frame(frame),
            Ok(None) => Decoded::End,
            Err(e) => {
                warn!(song = %song.id, error = %e, "Decode error, ending song early");
                Decoded::End
            }
        };

        match decoded {
            Decoded::Frame(mut frame) => {
                let position = shared.advance_frame(song.total_frames);

                #[cfg(feature = "spectrum")]
                if let Some(tap) = &shared.tap {
                    tap.push(&frame.samples, frame.channels, frame.sample_rate);
                }

                Volume::apply_gain(shared.gain(), &mut frame.samples);
                if let Err(e) = sink.write(&frame.samples, frame.channels, frame.sample_rate) {
                    error!(error = %e, "Audio output failed, stopping playback");
                    shared.abort_run(run);
                    return Some(source);
                }

                let due = !matches!(last_progress, Some(t) if t.elapsed() < interval);
                if due && !run.stopped() {
                    last_progress = Some(Instant::now());
                    shared.bus.publish(PlayerEvent::PlaybackProgress {
                        frame: position,
                        ms: song.ms_for_frame(position),
                    });
                }
            }
            Decoded::End => match shared.on_stream_end(run, &song, is_ad) {
                Continuation::Play {
                    song: next_song,
                    source: next_source,
                    ad,
                } => {
                    song = next_song;
                    source = next_source;
                    is_ad = ad;
                    last_progress = None;
                }
                Continuation::Halt => return None,
            },
        }
    }
}
