//! Property-based tests for the spectrum pipeline
//!
//! Every published bar must stay inside the display range whatever PCM is
//! fed in, and the animator must never let a peak cap fall below its bar.

use lyra_spectrum::{BarAnimator, SpectrumAnalyzer, SpectrumConfig, MAX_AMPLITUDE};
use proptest::prelude::*;

// ===== Property Tests =====

proptest! {
    /// Property: Analyzer targets stay in [0, 2] for arbitrary input
    #[test]
    fn analyzer_bars_stay_in_range(
        samples in prop::collection::vec(-8.0f32..8.0, 1024..6000),
        channels in 1u16..=2,
        rate in prop::sample::select(vec![22_050u32, 44_100, 48_000]),
    ) {
        let mut analyzer = SpectrumAnalyzer::new(SpectrumConfig::default(), rate).unwrap();
        let usable = samples.len() - samples.len() % channels as usize;

        if let Some(bars) = analyzer.push_interleaved(&samples[..usable], channels, rate) {
            prop_assert_eq!(bars.len(), 32);
            for bar in bars {
                prop_assert!(bar.is_finite());
                prop_assert!((0.0..=MAX_AMPLITUDE).contains(&bar), "bar {} out of range", bar);
            }
        }
    }

    /// Property: Animator output is clamped and peaks cap their bars
    #[test]
    fn animator_peaks_cap_bars(
        targets in prop::collection::vec(
            prop::collection::vec(-1.0f32..5.0, 32),
            1..40,
        ),
        steps_per_target in 1usize..6,
    ) {
        let mut animator = BarAnimator::new(&SpectrumConfig::default());

        for frame in targets {
            animator.set_targets(&frame);
            for _ in 0..steps_per_target {
                animator.step();
                for (bar, peak) in animator.amplitudes().iter().zip(animator.peaks()) {
                    prop_assert!((0.0..=MAX_AMPLITUDE).contains(bar));
                    prop_assert!(peak >= bar, "peak {} below bar {}", peak, bar);
                }
            }
        }
    }
}
