//! Property-based tests for navigation, history and seeking
//!
//! Uses proptest to verify invariants across many random inputs.

mod common;

use common::*;
use lyra_playback::{CommandHistory, NavStep, PlaylistNavigator, RepeatMode};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone)]
enum HistoryOp {
    Push(u32),
    Pop,
}

fn history_ops() -> impl Strategy<Value = Vec<HistoryOp>> {
    prop::collection::vec(
        prop_oneof![
            3 => any::<u32>().prop_map(HistoryOp::Push),
            1 => Just(HistoryOp::Pop),
        ],
        0..200,
    )
}

proptest! {
    /// Property: the ring behaves like a bounded stack that drops its oldest
    #[test]
    fn history_matches_bounded_stack(capacity in 1usize..40, ops in history_ops()) {
        let mut history = CommandHistory::new(capacity);
        let mut model: VecDeque<u32> = VecDeque::new();

        for op in ops {
            match op {
                HistoryOp::Push(v) => {
                    let evicted = history.push(v);
                    model.push_back(v);
                    let expected = if model.len() > capacity { model.pop_front() } else { None };
                    prop_assert_eq!(evicted, expected);
                }
                HistoryOp::Pop => {
                    prop_assert_eq!(history.pop(), model.pop_back());
                }
            }
            prop_assert!(history.len() <= capacity);
            prop_assert_eq!(history.len(), model.len());
        }

        let contents: Vec<u32> = history.iter().copied().collect();
        let expected: Vec<u32> = model.into_iter().collect();
        prop_assert_eq!(contents, expected);
    }

    /// Property: shuffling permutes only the unplayed tail
    #[test]
    fn shuffle_is_permutation_of_remaining(
        len in 2usize..40,
        advance in 0usize..40,
        seed in any::<u64>(),
    ) {
        let mut nav = PlaylistNavigator::new();
        nav.load_playlist(create_test_playlist(len, 10));
        for _ in 0..advance.min(len - 1) {
            let step = nav.peek_next(RepeatMode::NoRepeat);
            nav.commit(&step);
        }
        let before: Vec<String> = nav.order().map(|s| s.id.to_string()).collect();
        let cursor = nav.cursor();

        let mut rng = StdRng::seed_from_u64(seed);
        prop_assert!(nav.shuffle_remaining(&mut rng));

        let after: Vec<String> = nav.order().map(|s| s.id.to_string()).collect();
        prop_assert_eq!(&after[..=cursor], &before[..=cursor]);

        let mut tail_before = before[cursor + 1..].to_vec();
        let mut tail_after = after[cursor + 1..].to_vec();
        tail_before.sort();
        tail_after.sort();
        prop_assert_eq!(tail_before, tail_after);
        prop_assert_eq!(nav.cursor(), cursor);
    }

    /// Property: without repeat, L-1 nexts reach the last song, then finish
    #[test]
    fn no_repeat_visits_each_song_once(len in 1usize..30) {
        let mut nav = PlaylistNavigator::new();
        nav.load_playlist(create_test_playlist(len, 10));

        for expected in 1..len {
            let step = nav.peek_next(RepeatMode::NoRepeat);
            let is_load = matches!(step, NavStep::Load { cursor, .. } if cursor == expected);
            prop_assert!(is_load);
            nav.commit(&step);
        }
        prop_assert_eq!(nav.peek_next(RepeatMode::NoRepeat), NavStep::Finished);
    }

    /// Property: repeat-all returns to the start after L nexts
    #[test]
    fn repeat_all_cycles(len in 1usize..30, rounds in 1usize..3) {
        let mut nav = PlaylistNavigator::new();
        nav.load_playlist(create_test_playlist(len, 10));

        for _ in 0..len * rounds {
            let step = nav.peek_next(RepeatMode::RepeatAll);
            nav.commit(&step);
        }
        prop_assert_eq!(nav.cursor(), 0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: seeking never leaves the song
    #[test]
    fn seek_always_within_song(frames in 1u64..10_000, target in any::<u64>()) {
        let h = HarnessBuilder::new().build();
        h.player.load_song(create_test_song("a", frames)).unwrap();

        h.player.seek_to_frame(target).unwrap();

        prop_assert_eq!(h.player.current_frame(), target.min(frames));
        prop_assert!(h.player.snapshot().frame <= frames);
    }

    /// Property: replay rewinds by the window, clamped at zero
    #[test]
    fn replay_never_negative(start in 0u64..2_000) {
        let h = HarnessBuilder::new().paced(Duration::from_millis(1)).build();
        let song = create_test_song("a", 2_000);
        h.player.load_song(song.clone()).unwrap();
        h.player.play().unwrap();
        h.player.pause().unwrap();
        h.player.seek_to_frame(start).unwrap();

        h.player.replay_five_seconds().unwrap();

        let expected = start.saturating_sub(song.frames_for_ms(5_000));
        prop_assert_eq!(h.player.current_frame(), expected);
    }
}
