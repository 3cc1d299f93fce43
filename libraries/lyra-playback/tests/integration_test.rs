//! Integration tests for the player
//!
//! Real playback threads against scripted sources. Songs are short and the
//! sink is either unpaced (runs to completion immediately) or paced at a
//! millisecond per frame.

mod common;

use common::*;
use lyra_core::ListenerRole;
use lyra_playback::{
    Command, CommandInvoker, CommandOutcome, EventKind, PlaybackError, PlayerEvent, PlayerState,
    Rejection, RepeatMode,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);
const PACE: Duration = Duration::from_millis(1);

fn rejected(outcome: CommandOutcome) -> Option<Rejection> {
    outcome.rejection()
}

// ===== Transport =====

#[test]
fn play_pause_resume_stop() {
    let h = HarnessBuilder::new().paced(PACE).build();
    h.player.load_song(create_test_song("a", 5_000)).unwrap();
    assert_eq!(h.player.state(), PlayerState::Stopped);

    assert!(h.player.play().unwrap().is_applied());
    assert_eq!(h.player.state(), PlayerState::Playing);
    assert!(eventually(WAIT, || h.player.current_frame() > 10));

    assert!(h.player.pause().unwrap().is_applied());
    assert_eq!(h.player.state(), PlayerState::Paused);
    let paused_at = h.player.current_frame();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(h.player.current_frame(), paused_at, "position must hold while paused");

    assert!(h.player.play().unwrap().is_applied());
    assert!(eventually(WAIT, || h.player.current_frame() > paused_at));

    assert!(h.player.stop().unwrap().is_applied());
    assert_eq!(h.player.state(), PlayerState::Stopped);
    assert_eq!(h.player.current_frame(), 0);

    assert!(h.events.wait_for(WAIT, |e| *e == PlayerEvent::PlaybackStopped));
    let kinds: Vec<_> = h.events.transport().iter().map(PlayerEvent::kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::SongLoaded,
            EventKind::PlaybackStarted,
            EventKind::PlaybackPaused,
            EventKind::PlaybackStarted,
            EventKind::PlaybackStopped,
        ]
    );
}

#[test]
fn resume_continues_from_paused_stream() {
    let h = HarnessBuilder::new().paced(PACE).build();
    h.player.load_song(create_test_song("a", 5_000)).unwrap();
    h.player.play().unwrap();
    assert!(eventually(WAIT, || h.player.current_frame() > 5));
    h.player.pause().unwrap();
    h.player.play().unwrap();
    h.player.stop().unwrap();

    // one open on load; pause/resume reuses the stream
    assert_eq!(h.opener.opened().len(), 1);
}

#[test]
fn commands_without_song_are_rejected() {
    let h = HarnessBuilder::new().build();
    let p = &h.player;

    assert_eq!(rejected(p.play().unwrap()), Some(Rejection::NoSongLoaded));
    assert_eq!(rejected(p.pause().unwrap()), Some(Rejection::NoSongLoaded));
    assert_eq!(rejected(p.stop().unwrap()), Some(Rejection::NoSongLoaded));
    assert_eq!(rejected(p.next().unwrap()), Some(Rejection::NoSongLoaded));
    assert_eq!(rejected(p.previous().unwrap()), Some(Rejection::NoSongLoaded));
    assert_eq!(rejected(p.seek_to_frame(10).unwrap()), Some(Rejection::NoSongLoaded));
    assert_eq!(rejected(p.replay_five_seconds().unwrap()), Some(Rejection::NoSongLoaded));
    assert_eq!(rejected(p.shuffle_playlist().unwrap()), Some(Rejection::NoSongLoaded));

    // settings work without a song
    assert!(p.set_volume(-3.0).unwrap().is_applied());
    assert!(p.set_repeat_mode(RepeatMode::RepeatAll).unwrap().is_applied());
}

#[test]
fn invalid_transitions_leave_state_alone() {
    let h = HarnessBuilder::new().paced(PACE).build();
    let p = &h.player;
    p.load_song(create_test_song("a", 5_000)).unwrap();

    assert_eq!(
        rejected(p.pause().unwrap()),
        Some(Rejection::InvalidState(PlayerState::Stopped))
    );
    assert_eq!(
        rejected(p.replay_five_seconds().unwrap()),
        Some(Rejection::InvalidState(PlayerState::Stopped))
    );
    assert_eq!(rejected(p.stop().unwrap()), Some(Rejection::NothingToDo));

    p.play().unwrap();
    assert_eq!(
        rejected(p.play().unwrap()),
        Some(Rejection::InvalidState(PlayerState::Playing))
    );
    assert_eq!(p.state(), PlayerState::Playing);
    p.stop().unwrap();
}

#[test]
fn progress_is_monotonic_while_playing() {
    let h = HarnessBuilder::new().paced(PACE).build();
    h.player.load_song(create_test_song("a", 5_000)).unwrap();
    h.player.play().unwrap();

    assert!(h.events.wait_until(WAIT, |events| {
        events
            .iter()
            .filter(|e| matches!(e, PlayerEvent::PlaybackProgress { .. }))
            .count()
            >= 5
    }));
    h.player.pause().unwrap();

    let frames: Vec<u64> = h
        .events
        .all()
        .iter()
        .filter_map(|e| e.position().map(|(frame, _)| frame))
        .collect();
    assert!(frames.windows(2).all(|w| w[0] <= w[1]), "{frames:?}");
    assert!(frames.iter().all(|&f| f <= 5_000));
}

// ===== Loading =====

#[test]
fn load_playlist_selects_first_song() {
    let h = HarnessBuilder::new().build();
    let playlist = create_test_playlist(3, 20);

    assert!(h.player.load_playlist(playlist.clone()).unwrap().is_applied());

    let snapshot = h.player.snapshot();
    assert_eq!(snapshot.song.unwrap().id.as_str(), "s0");
    assert_eq!(snapshot.playlist_position, Some(0));
    assert_eq!(snapshot.playlist_len, 3);
    assert_eq!(snapshot.state, PlayerState::Stopped);

    let events = h.events.transport();
    assert_eq!(events[0], PlayerEvent::PlaylistLoaded { playlist: Some(playlist) });
    assert!(matches!(&events[1], PlayerEvent::SongLoaded { song } if song.id.as_str() == "s0"));
}

#[test]
fn empty_playlist_is_nothing_to_do() {
    let h = HarnessBuilder::new().build();
    let empty = lyra_core::Playlist::new("empty", Vec::new());
    assert_eq!(
        rejected(h.player.load_playlist(empty).unwrap()),
        Some(Rejection::NothingToDo)
    );
    assert!(h.player.current_song().is_none());
}

#[test]
fn single_song_replacing_playlist_clears_it() {
    let h = HarnessBuilder::new().build();
    h.player.load_playlist(create_test_playlist(3, 20)).unwrap();
    h.events.clear();

    h.player.load_song(create_test_song("solo", 20)).unwrap();

    let events = h.events.transport();
    assert_eq!(events[0], PlayerEvent::PlaylistLoaded { playlist: None });
    assert!(matches!(&events[1], PlayerEvent::SongLoaded { song } if song.id.as_str() == "solo"));
    assert_eq!(h.player.snapshot().playlist_len, 1);
}

#[test]
fn failed_load_reports_resource_error() {
    let h = HarnessBuilder::new()
        .opener(MockOpener::new().fail_open("broken"))
        .build();
    h.player.load_song(create_test_song("good", 20)).unwrap();

    let result = h.player.load_song(create_test_song("broken", 20));

    assert!(matches!(result, Err(PlaybackError::Resource(_))));
    assert_eq!(h.player.current_song().unwrap().id.as_str(), "good");
    assert_eq!(h.player.state(), PlayerState::Stopped);
}

#[test]
fn loading_while_playing_stops_first() {
    let h = HarnessBuilder::new().paced(PACE).build();
    h.player.load_song(create_test_song("a", 5_000)).unwrap();
    h.player.play().unwrap();
    assert!(h.events.wait_for(WAIT, |e| *e == PlayerEvent::PlaybackStarted));
    h.events.clear();

    h.player.load_song(create_test_song("b", 5_000)).unwrap();

    assert_eq!(h.player.state(), PlayerState::Stopped);
    assert_eq!(h.player.current_frame(), 0);
    assert!(h.events.wait_for(WAIT, |e| matches!(e, PlayerEvent::SongLoaded { .. })));
    let kinds: Vec<_> = h.events.transport().iter().map(PlayerEvent::kind).collect();
    assert_eq!(kinds, vec![EventKind::PlaybackStopped, EventKind::SongLoaded]);
}

// ===== Navigation =====

#[test]
fn no_repeat_next_walks_then_finishes() {
    let h = HarnessBuilder::new().build();
    h.player.load_playlist(create_test_playlist(4, 20)).unwrap();

    for expected in 1..4 {
        assert!(h.player.next().unwrap().is_applied());
        assert_eq!(h.player.snapshot().playlist_position, Some(expected));
    }

    assert!(h.player.next().unwrap().is_applied());
    assert_eq!(h.player.state(), PlayerState::Stopped);
    assert!(h.events.wait_for(WAIT, |e| *e == PlayerEvent::PlaybackFinished));
    assert_eq!(h.events.loaded_ids(), vec!["s0", "s1", "s2", "s3"]);
}

#[test]
fn repeat_all_wraps_both_ways() {
    let h = HarnessBuilder::new().build();
    h.player.load_playlist(create_test_playlist(3, 20)).unwrap();
    h.player.set_repeat_mode(RepeatMode::RepeatAll).unwrap();

    for _ in 0..3 {
        h.player.next().unwrap();
    }
    assert_eq!(h.player.snapshot().playlist_position, Some(0));

    h.player.previous().unwrap();
    assert_eq!(h.player.snapshot().playlist_position, Some(2));
}

#[test]
fn repeat_one_next_reloads_current_song() {
    let h = HarnessBuilder::new().build();
    h.player.load_playlist(create_test_playlist(3, 20)).unwrap();
    h.player.set_repeat_mode(RepeatMode::RepeatOne).unwrap();
    h.player.seek_to_frame(10).unwrap();

    assert!(h.player.next().unwrap().is_applied());
    assert_eq!(h.player.snapshot().playlist_position, Some(0));
    assert_eq!(h.player.current_frame(), 0);
}

#[test]
fn next_while_playing_keeps_playing() {
    let h = HarnessBuilder::new().paced(PACE).build();
    h.player.load_playlist(create_test_playlist(3, 5_000)).unwrap();
    h.player.play().unwrap();

    h.player.next().unwrap();

    assert_eq!(h.player.state(), PlayerState::Playing);
    assert_eq!(h.player.current_song().unwrap().id.as_str(), "s1");
    assert!(eventually(WAIT, || h.player.current_frame() > 0));
    h.player.stop().unwrap();
}

#[test]
fn next_while_paused_stays_paused_at_start() {
    let h = HarnessBuilder::new().paced(PACE).build();
    h.player.load_playlist(create_test_playlist(3, 5_000)).unwrap();
    h.player.play().unwrap();
    assert!(eventually(WAIT, || h.player.current_frame() > 5));
    h.player.pause().unwrap();

    h.player.next().unwrap();

    assert_eq!(h.player.state(), PlayerState::Paused);
    assert_eq!(h.player.current_frame(), 0);
    assert_eq!(h.player.current_song().unwrap().id.as_str(), "s1");
}

#[test]
fn shuffle_keeps_current_song() {
    let h = HarnessBuilder::new().build();
    h.player.load_playlist(create_test_playlist(10, 20)).unwrap();
    h.player.next().unwrap();
    h.player.next().unwrap();

    assert!(h.player.shuffle_playlist().unwrap().is_applied());

    let snapshot = h.player.snapshot();
    assert!(snapshot.shuffle_active);
    assert_eq!(snapshot.playlist_position, Some(2));
    assert_eq!(snapshot.song.unwrap().id.as_str(), "s2");

    h.player.load_song(create_test_song("solo", 20)).unwrap();
    assert_eq!(
        rejected(h.player.shuffle_playlist().unwrap()),
        Some(Rejection::NothingToDo)
    );
}

// ===== Natural completion =====

#[test]
fn playlist_plays_through_and_finishes() {
    let h = HarnessBuilder::new().roles(vec![ListenerRole::Premium]).build();
    h.player.load_playlist(create_test_playlist(3, 20)).unwrap();
    h.player.play().unwrap();

    assert!(h.events.wait_for(WAIT, |e| *e == PlayerEvent::PlaybackFinished));
    assert_eq!(h.events.loaded_ids(), vec!["s0", "s1", "s2"]);
    assert!(eventually(WAIT, || h.player.state() == PlayerState::Stopped));
    assert_eq!(h.player.current_frame(), 0);
    assert_eq!(h.player.current_song().unwrap().id.as_str(), "s2");
}

#[test]
fn repeat_all_loops_back_to_first_song() {
    let h = HarnessBuilder::new()
        .paced(PACE)
        .roles(vec![ListenerRole::Premium])
        .build();
    h.player.load_playlist(create_test_playlist(2, 10)).unwrap();
    h.player.set_repeat_mode(RepeatMode::RepeatAll).unwrap();
    h.player.play().unwrap();

    assert!(h.events.wait_until(WAIT, |events| {
        events
            .iter()
            .filter(|e| matches!(e, PlayerEvent::SongLoaded { .. }))
            .count()
            >= 5
    }));
    h.player.stop().unwrap();

    let ids = h.events.loaded_ids();
    assert_eq!(&ids[..5], &["s0", "s1", "s0", "s1", "s0"]);
}

#[test]
fn repeat_one_replays_on_completion() {
    let h = HarnessBuilder::new()
        .paced(PACE)
        .roles(vec![ListenerRole::Premium])
        .build();
    h.player.load_playlist(create_test_playlist(3, 10)).unwrap();
    h.player.set_repeat_mode(RepeatMode::RepeatOne).unwrap();
    h.player.play().unwrap();

    assert!(h.events.wait_until(WAIT, |events| {
        events
            .iter()
            .filter(|e| matches!(e, PlayerEvent::SongLoaded { .. }))
            .count()
            >= 3
    }));
    h.player.stop().unwrap();

    assert!(h.events.loaded_ids().iter().all(|id| id == "s0"));
}

#[test]
fn decode_error_moves_on_without_counting() {
    let h = HarnessBuilder::new()
        .opener(MockOpener::new().decode_error("s0", 3))
        .build();
    h.player.load_playlist(create_test_playlist(2, 20)).unwrap();
    h.player.play().unwrap();

    assert!(h.events.wait_for(WAIT, |e| *e == PlayerEvent::PlaybackFinished));
    assert_eq!(h.events.loaded_ids(), vec!["s0", "s1"]);

    // only s1 reached the completion threshold
    let listener = h.player.listener();
    assert_eq!(h.player.ad_gate().count(&listener), 1);
}

// ===== Advertisements =====

#[test]
fn ad_plays_after_every_fifth_completion() {
    let h = HarnessBuilder::new()
        .ads(vec![create_test_song("ad1", 10)])
        .build();
    h.player.load_playlist(create_test_playlist(7, 10)).unwrap();
    h.player.play().unwrap();

    assert!(h.events.wait_for(WAIT, |e| *e == PlayerEvent::PlaybackFinished));

    let sequence: Vec<String> = h
        .events
        .transport()
        .into_iter()
        .filter_map(|e| match e {
            PlayerEvent::SongLoaded { song } => Some(song.id.to_string()),
            PlayerEvent::AdOn { clip } => Some(format!("ad:{}", clip.id)),
            PlayerEvent::AdOff => Some("ad_off".into()),
            _ => None,
        })
        .collect();
    assert_eq!(
        sequence,
        vec!["s0", "s1", "s2", "s3", "s4", "ad:ad1", "ad_off", "s5", "s6"]
    );

    let listener = h.player.listener();
    assert_eq!(h.player.ad_gate().count(&listener), 2);
}

#[test]
fn ad_clips_rotate() {
    let h = HarnessBuilder::new()
        .ads(vec![create_test_song("ad1", 5), create_test_song("ad2", 5)])
        .build();
    h.player.load_playlist(create_test_playlist(10, 5)).unwrap();
    h.player.play().unwrap();

    assert!(h.events.wait_for(WAIT, |e| *e == PlayerEvent::PlaybackFinished));
    let clips: Vec<String> = h
        .events
        .all()
        .into_iter()
        .filter_map(|e| match e {
            PlayerEvent::AdOn { clip } => Some(clip.id.to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(clips, vec!["ad1", "ad2"]);
}

#[test]
fn exempt_listeners_never_hear_ads() {
    for role in [ListenerRole::Premium, ListenerRole::Admin, ListenerRole::Artist] {
        let h = HarnessBuilder::new()
            .ads(vec![create_test_song("ad1", 10)])
            .roles(vec![role])
            .build();
        h.player.load_playlist(create_test_playlist(7, 10)).unwrap();
        h.player.play().unwrap();

        assert!(h.events.wait_for(WAIT, |e| *e == PlayerEvent::PlaybackFinished));
        assert!(
            !h.events.all().iter().any(|e| matches!(e, PlayerEvent::AdOn { .. })),
            "{role:?} heard an ad"
        );
    }
}

#[test]
fn due_ad_without_clips_is_skipped() {
    let h = HarnessBuilder::new().build();
    h.player.load_playlist(create_test_playlist(7, 10)).unwrap();
    h.player.play().unwrap();

    assert!(h.events.wait_for(WAIT, |e| *e == PlayerEvent::PlaybackFinished));
    assert_eq!(h.events.loaded_ids().len(), 7);
    assert!(!h.events.all().iter().any(|e| matches!(e, PlayerEvent::AdOn { .. })));

    let listener = h.player.listener();
    assert_eq!(h.player.ad_gate().count(&listener), 2);
}

#[test]
fn transport_is_locked_during_ad_until_stop() {
    let h = HarnessBuilder::new()
        .paced(PACE)
        .ads(vec![create_test_song("ad1", 10_000)])
        .build();
    h.player.load_playlist(create_test_playlist(7, 5)).unwrap();
    h.player.play().unwrap();

    assert!(h.events.wait_for(WAIT, |e| matches!(e, PlayerEvent::AdOn { .. })));
    assert!(eventually(WAIT, || h.player.state() == PlayerState::AdPlaying));
    assert!(h.player.snapshot().ad_active);

    let p = &h.player;
    assert_eq!(rejected(p.next().unwrap()), Some(Rejection::AdPlaying));
    assert_eq!(rejected(p.previous().unwrap()), Some(Rejection::AdPlaying));
    assert_eq!(rejected(p.pause().unwrap()), Some(Rejection::AdPlaying));
    assert_eq!(rejected(p.seek_to_frame(0).unwrap()), Some(Rejection::AdPlaying));
    assert_eq!(rejected(p.set_volume(-10.0).unwrap()), Some(Rejection::AdPlaying));
    assert_eq!(rejected(p.shuffle_playlist().unwrap()), Some(Rejection::AdPlaying));
    assert!(p.set_repeat_mode(RepeatMode::RepeatAll).unwrap().is_applied());

    assert!(p.stop().unwrap().is_applied());
    assert_eq!(p.state(), PlayerState::Stopped);
    assert!(!p.snapshot().ad_active);
    assert_eq!(p.current_song().unwrap().id.as_str(), "s5");
    assert!(h.events.wait_for(WAIT, |e| *e == PlayerEvent::AdOff));

    // interrupted ad stays owed
    let listener = p.listener();
    assert_eq!(p.ad_gate().count(&listener), p.ad_gate().threshold() - 1);
}

// ===== Seek and replay =====

#[test]
fn seek_clamps_to_song_length() {
    let h = HarnessBuilder::new().build();
    let song = create_test_song("a", 100);
    h.player.load_song(song.clone()).unwrap();

    h.player.seek_to_frame(10_000).unwrap();
    assert_eq!(h.player.current_frame(), 100);

    h.player.seek_to_time_ms(1_300).unwrap();
    assert_eq!(h.player.current_frame(), song.frames_for_ms(1_300));

    assert!(h.events.wait_for(WAIT, |e| {
        *e == PlayerEvent::PlaybackProgress { frame: 100, ms: song.ms_for_frame(100) }
    }));
}

#[test]
fn seek_while_playing_restarts_at_target() {
    let h = HarnessBuilder::new().paced(PACE).build();
    h.player.load_song(create_test_song("a", 10_000)).unwrap();
    h.player.play().unwrap();

    h.player.seek_to_frame(5_000).unwrap();

    assert_eq!(h.player.state(), PlayerState::Playing);
    assert!(eventually(WAIT, || h.player.current_frame() > 5_000));
    h.player.stop().unwrap();
}

#[test]
fn replay_rewinds_five_seconds_without_going_negative() {
    let h = HarnessBuilder::new().paced(PACE).build();
    let song = create_test_song("a", 1_000);
    h.player.load_song(song.clone()).unwrap();
    h.player.play().unwrap();
    h.player.pause().unwrap();

    h.player.seek_to_frame(300).unwrap();
    h.player.replay_five_seconds().unwrap();
    assert_eq!(h.player.current_frame(), 300 - song.frames_for_ms(5_000));

    h.player.replay_five_seconds().unwrap();
    assert_eq!(h.player.current_frame(), 0);
    assert_eq!(h.player.state(), PlayerState::Paused);
}

#[test]
fn slider_drag_publishes_preview_only() {
    let h = HarnessBuilder::new().build();
    h.player.load_song(create_test_song("a", 100)).unwrap();

    h.player.drag_slider(500).unwrap();

    assert_eq!(h.player.current_frame(), 0);
    assert!(h.events.wait_for(WAIT, |e| {
        matches!(e, PlayerEvent::SliderDragging { frame: 100, .. })
    }));
}

// ===== Undo =====

#[test]
fn undo_history_is_bounded() {
    let h = HarnessBuilder::new().build();
    let mut invoker = CommandInvoker::for_player(Arc::clone(&h.player));
    assert_eq!(invoker.capacity(), 20);

    for i in 1..=21 {
        invoker.execute(Command::SetVolume(-(i as f32))).unwrap();
    }
    assert_eq!(invoker.history_len(), 20);
    assert_eq!(h.player.volume_db(), -21.0);

    for _ in 0..20 {
        assert!(invoker.undo().unwrap().is_some());
    }
    // the first command fell off the ring, so its effect stays
    assert_eq!(h.player.volume_db(), -1.0);
    assert!(invoker.undo().unwrap().is_none());
}

#[test]
fn undo_reverses_settings_and_transport() {
    let h = HarnessBuilder::new().paced(PACE).build();
    let mut invoker = CommandInvoker::for_player(Arc::clone(&h.player));

    invoker.execute(Command::LoadSong(create_test_song("a", 5_000))).unwrap();
    invoker.execute(Command::SetRepeatMode(RepeatMode::RepeatOne)).unwrap();
    invoker.execute(Command::Play).unwrap();

    invoker.undo().unwrap();
    assert_eq!(h.player.state(), PlayerState::Paused);

    invoker.undo().unwrap();
    assert_eq!(h.player.repeat_mode(), RepeatMode::NoRepeat);

    // load has no inverse
    assert_eq!(
        invoker.undo().unwrap(),
        Some(CommandOutcome::Rejected(Rejection::NothingToDo))
    );
    assert_eq!(h.player.current_song().unwrap().id.as_str(), "a");
}

#[test]
fn rejected_commands_are_not_recorded() {
    let h = HarnessBuilder::new().build();
    let mut invoker = CommandInvoker::for_player(Arc::clone(&h.player));

    invoker.execute(Command::Play).unwrap();
    invoker.execute(Command::SetVolume(0.0)).unwrap();

    assert_eq!(invoker.history_len(), 0);
}

#[test]
fn undo_of_seek_returns_to_previous_frame() {
    let h = HarnessBuilder::new().build();
    let mut invoker = CommandInvoker::for_player(Arc::clone(&h.player));
    invoker.execute(Command::LoadSong(create_test_song("a", 1_000))).unwrap();
    invoker.execute(Command::SeekToFrame(200)).unwrap();
    invoker.execute(Command::SeekToFrame(700)).unwrap();

    invoker.undo().unwrap();
    assert_eq!(h.player.current_frame(), 200);
}

// ===== Lifecycle =====

#[test]
fn dispose_stops_playback_and_rejects_commands() {
    let h = HarnessBuilder::new().paced(PACE).build();
    h.player.load_song(create_test_song("a", 5_000)).unwrap();
    h.player.play().unwrap();
    assert!(eventually(WAIT, || h.player.current_frame() > 0));

    h.player.dispose();

    assert!(h.player.is_disposed());
    assert_eq!(h.player.state(), PlayerState::Stopped);
    let written = h.sink.written();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(h.sink.written(), written, "no frames after dispose");

    assert!(matches!(h.player.play(), Err(PlaybackError::InvalidOperation(_))));
    h.player.dispose();
}

#[test]
fn panicking_subscriber_does_not_break_playback() {
    let h = HarnessBuilder::new().roles(vec![ListenerRole::Premium]).build();
    let _bad = h.player.subscribe(|e| {
        if matches!(e, PlayerEvent::SongLoaded { .. }) {
            panic!("subscriber failure");
        }
    });

    h.player.load_playlist(create_test_playlist(2, 10)).unwrap();
    h.player.play().unwrap();

    assert!(h.events.wait_for(WAIT, |e| *e == PlayerEvent::PlaybackFinished));
    assert_eq!(h.events.loaded_ids(), vec!["s0", "s1"]);
}

#[test]
fn pause_from_a_progress_subscriber_does_not_stall() {
    let h = HarnessBuilder::new().paced(PACE).build();
    let player = Arc::downgrade(&h.player);
    let fired = AtomicBool::new(false);
    let (tx, rx) = crossbeam_channel::bounded(1);

    let _pauser = h.player.events().subscribe_to(&[EventKind::PlaybackProgress], move |e| {
        let PlayerEvent::PlaybackProgress { frame, .. } = e else { return };
        if *frame < 20 || fired.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(player) = player.upgrade() else { return };
        let started = Instant::now();
        let applied = player.pause().map(|o| o.is_applied()).unwrap_or(false);
        let caller = thread::current().name().map(String::from);
        let _ = tx.try_send((started.elapsed(), applied, caller));
    });

    h.player.load_song(create_test_song("a", 5_000)).unwrap();
    h.player.play().unwrap();

    let (waited, applied, caller) = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(caller.as_deref(), Some("lyra-playback"));
    assert!(applied);
    assert!(waited < Duration::from_millis(500), "pause blocked for {waited:?}");
    assert_eq!(h.player.state(), PlayerState::Paused);

    // Let the thread leave the callback and see the stop flag
    thread::sleep(Duration::from_millis(30));
    let paused_at = h.player.current_frame();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(h.player.current_frame(), paused_at, "thread must exit after the callback");

    // The stream was dropped with the thread, so resuming reopens at the same frame
    assert!(h.player.play().unwrap().is_applied());
    assert!(eventually(WAIT, || h.player.current_frame() > paused_at));
    assert_eq!(h.opener.opened().len(), 2);
    h.player.stop().unwrap();
}

#[cfg(feature = "spectrum")]
#[test]
fn spectrum_bars_are_published_while_playing() {
    let mut config = test_config();
    config.spectrum_enabled = true;
    let h = HarnessBuilder::new().paced(PACE).config(config).build();
    h.player.load_song(create_test_song("a", 10_000)).unwrap();
    h.player.play().unwrap();

    assert!(h.events.wait_for(WAIT, |e| match e {
        PlayerEvent::SpectrumData { bars, peaks } => {
            bars.len() == 32 && peaks.len() == 32 && bars.iter().any(|&b| b > 0.0)
        }
        _ => false,
    }));
    h.player.stop().unwrap();
}
