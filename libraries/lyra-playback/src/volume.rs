//! Volume control in decibels
//!
//! Gain is expressed in dB inside a bounded range (default -40 to +40 dB).
//! The bottom of the range is treated as silence rather than -40 dB.

/// Volume controller
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    /// Current level in dB
    db: f32,

    min_db: f32,
    max_db: f32,

    /// Cached linear gain multiplier
    linear_gain: f32,
}

impl Volume {
    /// Create a volume controller, clamping `db` into `min_db..=max_db`
    pub fn new(db: f32, min_db: f32, max_db: f32) -> Self {
        let mut volume = Self {
            db: 0.0,
            min_db,
            max_db,
            linear_gain: 1.0,
        };
        volume.set_db(db);
        volume
    }

    /// Set level in dB, returning the clamped value actually applied
    pub fn set_db(&mut self, db: f32) -> f32 {
        let db = if db.is_nan() { self.min_db } else { db };
        self.db = db.clamp(self.min_db, self.max_db);
        self.linear_gain = self.calculate_linear_gain();
        self.db
    }

    pub fn db(&self) -> f32 {
        self.db
    }

    pub fn range(&self) -> (f32, f32) {
        (self.min_db, self.max_db)
    }

    /// Linear gain multiplier for audio processing
    pub fn gain(&self) -> f32 {
        self.linear_gain
    }

    pub fn is_silent(&self) -> bool {
        self.linear_gain == 0.0
    }

    /// Apply `gain` to a buffer in place and hard-limit to [-1, 1]
    pub fn apply_gain(gain: f32, buffer: &mut [f32]) {
        if gain == 0.0 {
            buffer.fill(0.0);
        } else if gain == 1.0 {
            for sample in buffer.iter_mut() {
                *sample = sample.clamp(-1.0, 1.0);
            }
        } else {
            for sample in buffer.iter_mut() {
                *sample = (*sample * gain).clamp(-1.0, 1.0);
            }
        }
    }

    /// Convert dB to linear gain: gain = 10^(dB/20)
    ///
    /// - min → 0.0 (silence)
    /// - 0 dB → 1.0 (unity)
    /// - +6 dB → ~2.0
    fn calculate_linear_gain(&self) -> f32 {
        if self.db <= self.min_db {
            return 0.0;
        }
        10.0_f32.powf(self.db / 20.0)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(0.0, -40.0, 40.0)
    }
}
