// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Retry backoff for operations that keep failing.
//!
//! Operations are retried on every drain pass until their attempt count
//! passes `threshold`. After that the gap between attempts doubles per
//! extra attempt, starting at `base` and capped at `max`. The policy is a
//! pure function of the attempt count; callers supply the current time.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

use crate::op::PendingOperation;

/// Exponential backoff applied per operation between drain passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Attempts allowed with no delay.
    pub threshold: u32,
    /// Delay after the first attempt past the threshold.
    pub base: Duration,
    /// Upper bound on any delay.
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy {
            threshold: 5,
            base: Duration::from_secs(1),
            max: Duration::from_secs(300),
        }
    }
}

impl BackoffPolicy {
    /// Returns the delay required after `attempts` failed attempts.
    pub fn delay(&self, attempts: u32) -> Duration {
        if attempts <= self.threshold {
            return Duration::ZERO;
        }
        let exponent = (attempts - self.threshold - 1).min(31);
        self.base.saturating_mul(1u32 << exponent).min(self.max)
    }

    /// Returns when `op` may next be attempted, or `None` if it is due now
    /// regardless of the clock.
    pub fn next_attempt_at(&self, op: &PendingOperation) -> Option<DateTime<Utc>> {
        let last = op.last_attempt_at?;
        let delay = self.delay(op.attempts);
        if delay.is_zero() {
            return None;
        }
        let delta = TimeDelta::from_std(delay).unwrap_or(TimeDelta::MAX);
        Some(last.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC))
    }

    /// Returns true if `op` may be attempted at `now`.
    pub fn is_due(&self, op: &PendingOperation, now: DateTime<Utc>) -> bool {
        match self.next_attempt_at(op) {
            None => true,
            Some(at) => now >= at,
        }
    }

    /// Returns the earliest backoff deadline among `ops` that is still in
    /// the future at `now`.
    pub fn earliest_deadline<'a>(
        &self,
        ops: impl IntoIterator<Item = &'a PendingOperation>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        ops.into_iter()
            .filter_map(|op| self.next_attempt_at(op))
            .filter(|at| *at > now)
            .min()
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
