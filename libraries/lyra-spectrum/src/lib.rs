//! Spectrum analysis for Lyra visualizers
//!
//! This crate turns decoded PCM into display-ready bar amplitudes:
//! - Overlapping Hann-windowed FFT, longer windows for narrow bars (`SpectrumAnalyzer`)
//! - Three-segment log-frequency banding with loudness weighting
//! - Recency-weighted history and per-band dynamic range compression
//! - Fixed-rate smoothing with peak-hold caps (`BarAnimator`)
//!
//! # Architecture
//!
//! ```text
//! playback thread          analysis thread              animation thread
//! ┌──────────────┐  PCM   ┌──────────────────┐ targets ┌────────────────┐
//! │ SpectrumTap  │ ─────► │ SpectrumAnalyzer │ ──────► │  BarAnimator   │ ──► publish(bars)
//! └──────────────┘ (SPSC) └──────────────────┘         └────────────────┘
//! ```
//!
//! The tap never blocks: when the analysis thread falls behind, chunks are
//! dropped rather than stalling playback. The animation thread only smooths
//! targets that were already computed; it never runs the FFT.
//!
//! # Example
//!
//! ```rust
//! use lyra_spectrum::{SpectrumAnalyzer, SpectrumConfig};
//!
//! let mut analyzer = SpectrumAnalyzer::new(SpectrumConfig::default(), 44_100).unwrap();
//! let tone: Vec<f32> = (0..4096)
//!     .map(|i| (2.0 * std::f32::consts::PI * 1_000.0 * i as f32 / 44_100.0).sin())
//!     .collect();
//!
//! let bars = analyzer.push_interleaved(&tone, 1, 44_100).unwrap();
//! assert_eq!(bars.len(), 32);
//! assert!(bars.iter().all(|b| (0.0..=2.0).contains(b)));
//! ```

#![deny(unsafe_code)]

mod analyzer;
mod animator;
mod bands;
mod config;
mod error;
mod service;

pub use analyzer::SpectrumAnalyzer;
pub use animator::BarAnimator;
pub use bands::{BandLayout, BandSegment, BarBand};
pub use config::{CompressorBand, SpectrumConfig};
pub use error::{Result, SpectrumError};
pub use service::{SpectrumFrame, SpectrumService, SpectrumTap};

/// Upper bound of any published bar amplitude
pub const MAX_AMPLITUDE: f32 = 2.0;
