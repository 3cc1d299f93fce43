//! Advertisement gating
//!
//! Every natural completion of a real song bumps the listener's counter.
//! When the counter reaches the threshold an ad is due; once it has played
//! the counter goes back to zero. Premium, admin and artist listeners never
//! see ads.

use lyra_core::{ListenerId, ListenerRole};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Completed-song counters keyed by listener
///
/// Cloning shares the same map. [`AdCounter::global`] is the process-wide
/// instance players use unless given their own.
#[derive(Debug, Clone, Default)]
pub struct AdCounter {
    counts: Arc<Mutex<HashMap<ListenerId, u32>>>,
}

impl AdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide counter map
    pub fn global() -> Self {
        static GLOBAL: OnceLock<AdCounter> = OnceLock::new();
        GLOBAL.get_or_init(AdCounter::new).clone()
    }

    pub fn get(&self, listener: &ListenerId) -> u32 {
        self.counts.lock().get(listener).copied().unwrap_or(0)
    }

    fn set(&self, listener: &ListenerId, value: u32) {
        self.counts.lock().insert(listener.clone(), value);
    }

    fn increment(&self, listener: &ListenerId) -> u32 {
        let mut counts = self.counts.lock();
        let count = counts.entry(listener.clone()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }
}

/// Decides when an advertisement interrupts playback
#[derive(Debug, Clone)]
pub struct AdGate {
    threshold: u32,
    counter: AdCounter,
}

impl AdGate {
    pub fn new(threshold: u32, counter: AdCounter) -> Self {
        Self {
            threshold: threshold.max(1),
            counter,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn counter(&self) -> &AdCounter {
        &self.counter
    }

    /// Whether an ad is due for `listener` right now
    ///
    /// Always `false` for ad-exempt roles; otherwise `true` exactly when the
    /// counter equals the threshold.
    pub fn should_show_ad(&self, listener: &ListenerId, roles: &[ListenerRole]) -> bool {
        if roles.iter().any(|r| r.is_ad_exempt()) {
            return false;
        }
        self.counter.get(listener) == self.threshold
    }

    /// Record one natural song completion, returning the new count
    pub fn update_counter(&self, listener: &ListenerId) -> u32 {
        self.counter.increment(listener)
    }

    /// Zero the counter after an ad has played
    pub fn reset_counter(&self, listener: &ListenerId) {
        self.counter.set(listener, 0);
    }

    /// Keep an interrupted ad owed: the next completion makes it due again
    pub fn defer(&self, listener: &ListenerId) {
        self.counter.set(listener, self.threshold - 1);
    }

    pub fn count(&self, listener: &ListenerId) -> u32 {
        self.counter.get(listener)
    }
}
