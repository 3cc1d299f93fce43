//! Threaded spectrum service
//!
//! Two threads cooperate:
//! - analysis: drains PCM chunks from the tap and runs the FFT pipeline
//! - animation: ticks at `fps`, eases bars toward the latest targets and
//!   publishes a `SpectrumFrame` whenever something visibly moved
//!
//! When no PCM arrives the analysis thread simply waits; the last targets
//! stay in place, so the display holds instead of collapsing.

use crate::analyzer::SpectrumAnalyzer;
use crate::animator::BarAnimator;
use crate::config::SpectrumConfig;
use crate::error::{Result, SpectrumError};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use lyra_core::{JoinError, WorkerThread};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Pending chunks the tap may queue before new ones are dropped
const TAP_CAPACITY: usize = 64;

/// How long the analysis thread waits for PCM before rechecking shutdown
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default assumed rate until the first chunk arrives
const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Display-ready bar state
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    /// Smoothed amplitudes in [0, 2]
    pub bars: Vec<f32>,

    /// Peak-hold caps, never below the matching bar
    pub peaks: Vec<f32>,
}

enum TapMessage {
    Pcm {
        samples: Vec<f32>,
        channels: u16,
        sample_rate: u32,
    },
    Reset,
}

/// Non-blocking producer handle for the playback thread
#[derive(Clone)]
pub struct SpectrumTap {
    tx: Sender<TapMessage>,
}

impl SpectrumTap {
    /// Hand a decoded chunk to the analysis thread
    ///
    /// Never blocks. Returns `false` if the chunk was dropped because the
    /// analysis thread is behind or gone.
    pub fn push(&self, samples: &[f32], channels: u16, sample_rate: u32) -> bool {
        match self.tx.try_send(TapMessage::Pcm {
            samples: samples.to_vec(),
            channels,
            sample_rate,
        }) {
            Ok(()) => true,
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => false,
        }
    }

    /// Ask the service to drop its state and fade the bars to zero
    pub fn reset(&self) {
        let _ = self.tx.try_send(TapMessage::Reset);
    }
}

struct SharedTargets {
    bars: Mutex<Vec<f32>>,
    generation: AtomicU64,
}

/// Owns the analysis and animation threads
pub struct SpectrumService {
    tap: SpectrumTap,
    shutdown: Arc<AtomicBool>,
    analysis: Option<WorkerThread<()>>,
    animation: Option<WorkerThread<()>>,
    join_timeout: Duration,
}

impl SpectrumService {
    /// Start both threads, publishing every visible change through `publish`
    ///
    /// `publish` runs on the animation thread.
    ///
    /// # Errors
    /// Returns `InvalidConfig` for a bad configuration and `ThreadSpawn` if
    /// either thread cannot be created.
    pub fn start<F>(config: SpectrumConfig, join_timeout: Duration, publish: F) -> Result<Self>
    where
        F: FnMut(SpectrumFrame) + Send + 'static,
    {
        let analyzer = SpectrumAnalyzer::new(config.clone(), DEFAULT_SAMPLE_RATE)?;
        let animator = BarAnimator::new(&config);

        let (tx, rx) = bounded(TAP_CAPACITY);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shared = Arc::new(SharedTargets {
            bars: Mutex::new(vec![0.0; config.bars]),
            generation: AtomicU64::new(0),
        });

        let analysis = {
            let shutdown = Arc::clone(&shutdown);
            let shared = Arc::clone(&shared);
            WorkerThread::spawn("lyra-spectrum-analysis", move || {
                run_analysis(analyzer, rx, shared, shutdown);
            })
            .map_err(|e| SpectrumError::ThreadSpawn(e.to_string()))?
        };

        let period = Duration::from_secs_f64(1.0 / f64::from(config.fps));
        let animation = {
            let shutdown = Arc::clone(&shutdown);
            WorkerThread::spawn("lyra-spectrum-animation", move || {
                run_animation(animator, shared, shutdown, period, publish);
            })
        };

        let animation = match animation {
            Ok(handle) => handle,
            Err(e) => {
                shutdown.store(true, Ordering::SeqCst);
                let _ = analysis.join_timeout(join_timeout);
                return Err(SpectrumError::ThreadSpawn(e.to_string()));
            }
        };

        debug!(bars = config.bars, fps = config.fps, "Spectrum service started");

        Ok(Self {
            tap: SpectrumTap { tx },
            shutdown,
            analysis: Some(analysis),
            animation: Some(animation),
            join_timeout,
        })
    }

    pub fn tap(&self) -> SpectrumTap {
        self.tap.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.load(Ordering::SeqCst)
    }

    /// Stop both threads, waiting at most the configured join timeout each
    ///
    /// A thread that does not finish in time is detached and logged. Called
    /// from the animation thread itself (a subscriber reacting to a frame),
    /// that thread is left to exit on its own.
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);

        for (name, worker) in [
            ("analysis", self.analysis.take()),
            ("animation", self.animation.take()),
        ] {
            let Some(worker) = worker else { continue };
            match worker.join_timeout(self.join_timeout) {
                Ok(()) => {}
                Err(JoinError::OwnThread) => {
                    debug!(thread = name, "Spectrum shut down from its own thread");
                }
                Err(e) => error!(thread = name, error = %e, "Spectrum thread did not stop, detaching"),
            }
        }
    }
}

impl Drop for SpectrumService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_analysis(
    mut analyzer: SpectrumAnalyzer,
    rx: Receiver<TapMessage>,
    shared: Arc<SharedTargets>,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::SeqCst) {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(TapMessage::Pcm {
                samples,
                channels,
                sample_rate,
            }) => {
                if let Some(targets) = analyzer.push_interleaved(&samples, channels, sample_rate) {
                    *shared.bars.lock() = targets;
                    shared.generation.fetch_add(1, Ordering::Release);
                }
            }
            Ok(TapMessage::Reset) => {
                analyzer.reset();
                shared.bars.lock().iter_mut().for_each(|b| *b = 0.0);
                shared.generation.fetch_add(1, Ordering::Release);
            }
            // Nothing decoded lately: keep the last targets
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Spectrum analysis thread exiting");
}

fn run_animation<F>(
    mut animator: BarAnimator,
    shared: Arc<SharedTargets>,
    shutdown: Arc<AtomicBool>,
    period: Duration,
    mut publish: F,
) where
    F: FnMut(SpectrumFrame),
{
    let mut seen = 0;
    let mut next_tick = Instant::now() + period;

    while !shutdown.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now < next_tick {
            thread::sleep(next_tick - now);
        } else if now - next_tick > period * 4 {
            warn!("Spectrum animation fell behind, skipping frames");
            next_tick = now;
        }
        next_tick += period;

        let generation = shared.generation.load(Ordering::Acquire);
        if generation != seen {
            seen = generation;
            animator.set_targets(&shared.bars.lock());
        }

        if animator.step() {
            publish(SpectrumFrame {
                bars: animator.amplitudes().to_vec(),
                peaks: animator.peaks().to_vec(),
            });
        }
    }
    debug!("Spectrum animation thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn publishes_bars_for_fed_pcm_and_stops_cleanly() {
        let (frames_tx, frames_rx) = crossbeam_channel::unbounded();
        let mut service = SpectrumService::start(
            SpectrumConfig::default(),
            Duration::from_secs(2),
            move |frame| {
                let _ = frames_tx.send(frame);
            },
        )
        .unwrap();

        let tap = service.tap();
        let tone: Vec<f32> = (0..4096)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / 44_100.0).sin())
            .collect();
        assert!(tap.push(&tone, 1, 44_100));

        let frame = frames_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(frame.bars.len(), 32);
        assert!(frame.bars.iter().all(|b| (0.0..=2.0).contains(b)));
        assert!(frame
            .bars
            .iter()
            .zip(frame.peaks.iter())
            .all(|(b, p)| p >= b));

        service.shutdown();
        assert!(!service.is_running());
        // Analysis thread is gone, so the tap reports drops
        assert!(!tap.push(&tone, 1, 44_100));
    }

    #[test]
    fn silence_publishes_nothing() {
        let (frames_tx, frames_rx) = crossbeam_channel::unbounded();
        let _service = SpectrumService::start(
            SpectrumConfig::default(),
            Duration::from_secs(2),
            move |frame| {
                let _ = frames_tx.send(frame);
            },
        )
        .unwrap();

        assert!(frames_rx.recv_timeout(Duration::from_millis(150)).is_err());
    }

    #[test]
    fn shutdown_from_a_frame_callback_does_not_wait_for_itself() {
        let slot: Arc<Mutex<Option<SpectrumService>>> = Arc::new(Mutex::new(None));
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);

        let callback_slot = Arc::clone(&slot);
        let service = SpectrumService::start(
            SpectrumConfig::default(),
            Duration::from_secs(2),
            move |_frame| {
                if let Some(mut service) = callback_slot.lock().take() {
                    let started = Instant::now();
                    service.shutdown();
                    let _ = done_tx.send((started.elapsed(), service.is_running()));
                }
            },
        )
        .unwrap();
        let tap = service.tap();
        *slot.lock() = Some(service);

        let tone: Vec<f32> = (0..4096)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / 44_100.0).sin())
            .collect();
        assert!(tap.push(&tone, 1, 44_100));

        let (waited, running) = done_rx.recv_timeout(Duration::from_secs(3)).unwrap();
        assert!(waited < Duration::from_millis(500), "shutdown took {waited:?}");
        assert!(!running);
    }
}
