//! # Clock Tolerance Policy
//!
//! Maps a claimed timestamp and local time to a verdict. The tolerance is
//! asymmetric: network delay pushes timestamps into the past far more often
//! than skew pushes them into the future.
//!
//! - `now - claimed > past_secs` → `NOT_ENOUGH_TIME` (stale, soft failure)
//! - `claimed - now > future_secs` → `DISPUTE` (only a broken or malicious
//!   clock produces it)
//! - otherwise → `SUCCESS`; both boundaries are inclusive.

use serde::{Deserialize, Serialize};

use crate::flag::ExecutionFlag;
use crate::temporal::Timestamp;

/// Default maximum age of an accepted timestamp, in seconds.
pub const TOLERANCE_PAST_SECS: u64 = 5;

/// Default maximum lead of an accepted timestamp over local time, in seconds.
pub const TOLERANCE_FUTURE_SECS: u64 = 10;

/// Clock-skew bounds for accepting a peer's timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TolerancePolicy {
    /// Maximum age in seconds.
    #[serde(default = "default_past")]
    pub past_secs: u64,
    /// Maximum lead in seconds.
    #[serde(default = "default_future")]
    pub future_secs: u64,
}

fn default_past() -> u64 {
    TOLERANCE_PAST_SECS
}

fn default_future() -> u64 {
    TOLERANCE_FUTURE_SECS
}

impl Default for TolerancePolicy {
    fn default() -> Self {
        Self {
            past_secs: TOLERANCE_PAST_SECS,
            future_secs: TOLERANCE_FUTURE_SECS,
        }
    }
}

impl TolerancePolicy {
    /// Evaluate raw epoch seconds.
    pub fn evaluate_secs(&self, claimed: i64, now: i64) -> ExecutionFlag {
        let age = i128::from(now) - i128::from(claimed);
        if age > i128::from(self.past_secs) {
            ExecutionFlag::NotEnoughTime
        } else if age < -i128::from(self.future_secs) {
            ExecutionFlag::Dispute
        } else {
            ExecutionFlag::Success
        }
    }

    /// Evaluate a claimed timestamp against local time.
    pub fn evaluate(&self, claimed: &Timestamp, now: &Timestamp) -> ExecutionFlag {
        self.evaluate_secs(claimed.epoch_secs(), now.epoch_secs())
    }

    /// Whether `claimed` lies beyond the future bound relative to `reference`.
    ///
    /// Used for blocks posted on-chain, where staleness is irrelevant but a
    /// timestamp ahead of chain time is still disputable.
    pub fn is_too_far_in_future(&self, claimed: &Timestamp, reference: &Timestamp) -> bool {
        matches!(
            self.evaluate_secs(claimed.epoch_secs(), reference.epoch_secs()),
            ExecutionFlag::Dispute
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_inclusive() {
        let p = TolerancePolicy::default();
        assert_eq!(p.evaluate_secs(100, 105), ExecutionFlag::Success);
        assert_eq!(p.evaluate_secs(100, 106), ExecutionFlag::NotEnoughTime);
        assert_eq!(p.evaluate_secs(110, 100), ExecutionFlag::Success);
        assert_eq!(p.evaluate_secs(111, 100), ExecutionFlag::Dispute);
        assert_eq!(p.evaluate_secs(100, 100), ExecutionFlag::Success);
    }

    #[test]
    fn timestamp_evaluation_matches_seconds() {
        let p = TolerancePolicy::default();
        let now = Timestamp::from_epoch_secs(1_000_000).unwrap();
        assert_eq!(p.evaluate(&now.offset_secs(-6), &now), ExecutionFlag::NotEnoughTime);
        assert_eq!(p.evaluate(&now.offset_secs(11), &now), ExecutionFlag::Dispute);
        assert!(p.is_too_far_in_future(&now.offset_secs(11), &now));
        assert!(!p.is_too_far_in_future(&now.offset_secs(-600), &now));
    }

    #[test]
    fn extreme_values_do_not_overflow() {
        let p = TolerancePolicy::default();
        assert_eq!(p.evaluate_secs(i64::MIN, i64::MAX), ExecutionFlag::NotEnoughTime);
        assert_eq!(p.evaluate_secs(i64::MAX, i64::MIN), ExecutionFlag::Dispute);
    }

    #[test]
    fn serde_defaults() {
        let p: TolerancePolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(p, TolerancePolicy::default());
    }
}
