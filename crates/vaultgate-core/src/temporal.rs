//! # Ledger Time
//!
//! All deadlines in vaultgate are epoch milliseconds as reported by the
//! ledger clock. Expiry is a predicate evaluated against ledger time at
//! decision time; nothing caches it.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Milliseconds in one minute.
pub const MILLIS_PER_MINUTE: u64 = 60_000;

/// A point in time as milliseconds since the Unix epoch (UTC).
///
/// Serializes as a plain integer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EpochMillis(u64);

impl EpochMillis {
    /// Wrap a raw millisecond count.
    pub const fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Self::from_datetime(&Utc::now())
    }

    /// Convert from a `chrono::DateTime<Utc>`. Pre-epoch times clamp to zero.
    pub fn from_datetime(dt: &DateTime<Utc>) -> Self {
        Self(u64::try_from(dt.timestamp_millis()).unwrap_or(0))
    }

    /// Raw millisecond count.
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Add a duration in milliseconds, saturating at `u64::MAX`.
    pub fn saturating_add_millis(&self, millis: u64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Add a number of minutes, saturating at `u64::MAX`.
    pub fn saturating_add_minutes(&self, minutes: u64) -> Self {
        self.saturating_add_millis(minutes.saturating_mul(MILLIS_PER_MINUTE))
    }

    /// Render as a `chrono::DateTime<Utc>`, if representable.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.0)
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }
}

impl std::fmt::Display for EpochMillis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.3fZ")),
            None => write!(f, "{}ms", self.0),
        }
    }
}
