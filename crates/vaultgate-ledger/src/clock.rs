//! # Ledger Time
//!
//! Expiry is evaluated against ledger time, never a caller's wall clock.
//! [`ManualClock`] lets tests move time forward without sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use vaultgate_core::{EpochMillis, MILLIS_PER_MINUTE};

/// Source of ledger time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current ledger time.
    fn now(&self) -> EpochMillis;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> EpochMillis {
        EpochMillis::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: EpochMillis) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(start.as_millis())),
        }
    }

    /// Set the current time.
    pub fn set(&self, at: EpochMillis) {
        self.millis.store(at.as_millis(), Ordering::SeqCst);
    }

    /// Advance by a number of milliseconds.
    pub fn advance_millis(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    /// Advance by a number of minutes.
    pub fn advance_minutes(&self, minutes: u64) {
        self.advance_millis(minutes.saturating_mul(MILLIS_PER_MINUTE));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> EpochMillis {
        EpochMillis::new(self.millis.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_and_shares_state() {
        let clock = ManualClock::new(EpochMillis::new(1_000));
        let other = clock.clone();
        clock.advance_minutes(2);
        assert_eq!(other.now(), EpochMillis::new(121_000));
        other.set(EpochMillis::new(5));
        assert_eq!(clock.now().as_millis(), 5);
    }

    #[test]
    fn system_clock_is_after_2024() {
        assert!(SystemClock.now().as_millis() > 1_704_067_200_000);
    }
}
