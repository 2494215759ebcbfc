//! # Temporal Types — UTC Timestamps and Clocks
//!
//! `Timestamp` is a UTC instant truncated to whole seconds. Every signed
//! record carries one, and canonical encoding renders it as
//! `YYYY-MM-DDTHH:MM:SSZ`, so two peers always agree on the bytes.
//!
//! Time is never read ambiently by the replication core. Components take a
//! [`Clock`]; production wiring uses [`SystemClock`], tests and the
//! simulator use [`ManualClock`].

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChanError;

/// A UTC-only timestamp, truncated to seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated.
    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    /// From a `DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt.with_nanosecond(0).unwrap_or(dt))
    }

    /// From Unix epoch seconds.
    pub fn from_epoch_secs(secs: i64) -> Result<Self, ChanError> {
        DateTime::from_timestamp(secs, 0)
            .map(Self)
            .ok_or_else(|| ChanError::InvalidValue(format!("invalid unix timestamp: {secs}")))
    }

    /// Parse an RFC 3339 string with the `Z` suffix.
    pub fn parse(s: &str) -> Result<Self, ChanError> {
        if !s.ends_with('Z') {
            return Err(ChanError::InvalidValue(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| ChanError::InvalidValue(format!("invalid RFC 3339 timestamp {s:?}: {e}")))?;
        Ok(Self::from_utc(dt.with_timezone(&Utc)))
    }

    /// Unix epoch seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// This instant shifted by `secs` (negative shifts into the past).
    ///
    /// Saturates at the representable range instead of failing.
    pub fn offset_secs(&self, secs: i64) -> Self {
        let shifted = chrono::Duration::try_seconds(secs)
            .and_then(|d| self.0.checked_add_signed(d))
            .unwrap_or(self.0);
        Self(shifted)
    }

    /// Seconds elapsed from `earlier` to `self` (negative if `earlier` is later).
    pub fn secs_since(&self, earlier: &Timestamp) -> i64 {
        self.epoch_secs() - earlier.epoch_secs()
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Render as ISO8601 with Z suffix.
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

/// Source of the local notion of "now".
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// The current time.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying instant, so a test can hand one clone
/// to every component and advance them all at once.
#[derive(Debug, Clone)]
pub struct ManualClock {
    secs: Arc<AtomicI64>,
}

impl ManualClock {
    /// A clock frozen at the given instant.
    pub fn new(start: Timestamp) -> Self {
        Self {
            secs: Arc::new(AtomicI64::new(start.epoch_secs())),
        }
    }

    /// Jump to an absolute instant.
    pub fn set(&self, to: Timestamp) {
        self.secs.store(to.epoch_secs(), Ordering::SeqCst);
    }

    /// Move forward (or backward, for negative values) by `secs`.
    pub fn advance(&self, secs: i64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        let secs = self.secs.load(Ordering::SeqCst);
        Timestamp::from_epoch_secs(secs).unwrap_or_else(|_| Timestamp::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn from_utc_truncates() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 15, 12, 30, 45).unwrap();
        let ts = Timestamp::from_utc(dt.with_nanosecond(123_456_789).unwrap());
        assert_eq!(ts.as_datetime().nanosecond(), 0);
        assert_eq!(ts.to_iso8601(), "2026-01-15T12:30:45Z");
    }

    #[test]
    fn parse_rejects_offsets() {
        assert!(Timestamp::parse("2026-01-15T12:00:00Z").is_ok());
        assert!(Timestamp::parse("2026-01-15T12:00:00+00:00").is_err());
        assert!(Timestamp::parse("garbage").is_err());
    }

    #[test]
    fn epoch_roundtrip_and_offsets() {
        let ts = Timestamp::from_epoch_secs(1_800_000_000).unwrap();
        assert_eq!(ts.epoch_secs(), 1_800_000_000);
        let later = ts.offset_secs(10);
        assert_eq!(later.secs_since(&ts), 10);
        assert_eq!(ts.secs_since(&later), -10);
        assert_eq!(ts.offset_secs(-5).epoch_secs(), 1_799_999_995);
    }

    #[test]
    fn serde_is_iso_string() {
        let ts = Timestamp::parse("2026-01-15T12:00:00Z").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2026-01-15T12:00:00Z\"");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let start = Timestamp::from_epoch_secs(1_000).unwrap();
        let clock = ManualClock::new(start);
        let other = clock.clone();
        clock.advance(7);
        assert_eq!(other.now().epoch_secs(), 1_007);
        other.set(start);
        assert_eq!(clock.now(), start);
    }
}
