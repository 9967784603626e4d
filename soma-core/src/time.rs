//! Monotonic timestamps at microsecond resolution
//!
//! Every sensor record and cognitive event carries a `Timestamp`. The clock
//! is anchored at first use of `Timestamp::now()` and only moves forward;
//! wall-clock time is never used for fusion.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

fn epoch() -> Instant {
    *EPOCH.get_or_init(Instant::now)
}

/// Monotonic instant, microseconds since process clock anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    /// Current monotonic time.
    pub fn now() -> Self {
        Timestamp(epoch().elapsed().as_micros() as i64)
    }

    pub fn from_micros(micros: i64) -> Self {
        Timestamp(micros)
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        Timestamp((secs * 1_000_000.0) as i64)
    }

    pub fn as_micros(&self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Signed distance `self - earlier`, in seconds.
    pub fn seconds_since(&self, earlier: Timestamp) -> f64 {
        (self.0 - earlier.0) as f64 / 1_000_000.0
    }

    pub fn add_secs(&self, secs: f64) -> Timestamp {
        Timestamp(self.0 + (secs * 1_000_000.0) as i64)
    }

    pub fn add_micros(&self, micros: i64) -> Timestamp {
        Timestamp(self.0 + micros)
    }
}

/// Records that can live inside a [`crate::RingTrack`].
pub trait HasTimestamp {
    fn timestamp(&self) -> Timestamp;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_monotonic() {
        let a = Timestamp::now();
        let b = Timestamp::now();
        assert!(b >= a);
    }

    #[test]
    fn test_seconds_since_signed() {
        let a = Timestamp::from_micros(1_000_000);
        let b = Timestamp::from_micros(3_500_000);
        assert!((b.seconds_since(a) - 2.5).abs() < 1e-9);
        assert!((a.seconds_since(b) + 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_add_secs_round_trip() {
        let a = Timestamp::from_micros(250);
        let b = a.add_secs(0.5);
        assert_eq!(b.as_micros(), 500_250);
    }
}
