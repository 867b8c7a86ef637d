// ledger-core/src/types.rs

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Block number/height
pub type BlockNumber = u64;

/// Proof-of-work nonce
pub type Nonce = u64;

/// Timestamp in Unix epoch milliseconds
pub type Timestamp = u64;

/// Where a recorded transaction currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Waiting in the pool for the next sealed block
    Pending,
    /// Included in a block on the ledger
    Confirmed,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Confirmed => write!(f, "confirmed"),
        }
    }
}

/// Current wall-clock time in milliseconds
pub fn wall_clock_millis() -> Timestamp {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Wall clock whose readings strictly increase.
///
/// Each reading is at least one millisecond past the previous one, so two
/// transactions stamped by the same clock never share a `recorded_at`, even
/// within one millisecond or if the system clock steps back.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicU64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Timestamp {
        self.observe(wall_clock_millis())
    }

    fn observe(&self, wall: Timestamp) -> Timestamp {
        let next = |last: Timestamp| wall.max(last.saturating_add(1));
        match self.last.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(next(last))) {
            Ok(previous) | Err(previous) => next(previous),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        assert_eq!(clock.observe(1_000), 1_000);
        assert_eq!(clock.observe(900), 1_001);
        assert_eq!(clock.observe(1_200), 1_200);
    }

    #[test]
    fn test_clock_same_millisecond_is_distinct() {
        let clock = MonotonicClock::new();
        let stamps: Vec<Timestamp> = (0..50).map(|_| clock.observe(5_000)).collect();
        assert_eq!(stamps.first(), Some(&5_000));
        assert_eq!(stamps.last(), Some(&5_049));
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_clock_tracks_wall_time() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(a > 0);
        assert!(b > a);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TransactionStatus::Pending.to_string(), "pending");
        assert_eq!(TransactionStatus::Confirmed.to_string(), "confirmed");
    }
}
