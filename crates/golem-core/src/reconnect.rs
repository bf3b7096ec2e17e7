//! Reconnection admission policy.
//!
//! Tracks attempt counts and cooldown windows between connection
//! attempts:
//!
//! - **Admission**: a new attempt is permitted only after the cooldown
//!   has elapsed since the previous one and while the attempt counter
//!   is below the ceiling.
//! - **Tiered backoff**: the rotation delay after a failure is a coarse
//!   bucket of the attempt counter (short / medium / long), not a
//!   function of wall-clock history.
//! - **Sticky escalation**: throttle or timeout hints raise the cooldown
//!   tier and it stays raised until the policy is explicitly reset.
//! - **Freeze/thaw**: at the attempt ceiling, admission is denied until a
//!   separate long reset deadline passes, which zeroes the counter once.
//!
//! Pure and deterministic: all time values are passed in as parameters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Config ───────────────────────────────────────────────────────

/// Reconnection policy knobs. All delays in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Minimum gap between two connection attempts (default 10s).
    pub baseline_cooldown_ms: u64,
    /// Cooldown while the throttle tier is raised (default 60s).
    pub elevated_cooldown_ms: u64,
    /// Rotation delay for attempts 1-2 (default 5s).
    pub short_delay_ms: u64,
    /// Rotation delay for attempts 3-4 (default 30s).
    pub medium_delay_ms: u64,
    /// Rotation delay for attempts 5+ (default 120s).
    pub long_delay_ms: u64,
    /// Attempt ceiling before the freeze engages (default 8).
    pub max_attempts: u32,
    /// Freeze duration; expiry zeroes the attempt counter (default 10min).
    pub freeze_reset_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            baseline_cooldown_ms: 10_000,
            elevated_cooldown_ms: 60_000,
            short_delay_ms: 5_000,
            medium_delay_ms: 30_000,
            long_delay_ms: 120_000,
            max_attempts: 8,
            freeze_reset_ms: 600_000,
        }
    }
}

// ─── Tier ─────────────────────────────────────────────────────────

/// Cooldown tier. Raised on throttle hints, sticky until reset.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CooldownTier {
    #[default]
    Baseline,
    Elevated,
}

// ─── Policy ───────────────────────────────────────────────────────

/// Mutable reconnection counters. One instance lives for the process.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt: u32,
    last_attempt_at: Option<DateTime<Utc>>,
    tier: CooldownTier,
    frozen_until: Option<DateTime<Utc>>,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempt: 0,
            last_attempt_at: None,
            tier: CooldownTier::Baseline,
            frozen_until: None,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn tier(&self) -> CooldownTier {
        self.tier
    }

    /// Active cooldown for the current tier.
    pub fn cooldown_ms(&self) -> u64 {
        match self.tier {
            CooldownTier::Baseline => self.config.baseline_cooldown_ms,
            CooldownTier::Elevated => self.config.elevated_cooldown_ms,
        }
    }

    /// Record a connection attempt at `now`.
    ///
    /// Reaching the attempt ceiling arms the freeze deadline.
    pub fn record_attempt(&mut self, now: DateTime<Utc>) {
        self.attempt = self.attempt.saturating_add(1);
        self.last_attempt_at = Some(now);
        if self.attempt >= self.config.max_attempts && self.frozen_until.is_none() {
            self.frozen_until = Some(now + chrono::TimeDelta::milliseconds(self.config.freeze_reset_ms as i64));
        }
    }

    /// Admission check: cooldown elapsed and attempt ceiling not reached.
    pub fn can_connect(&self, now: DateTime<Utc>) -> bool {
        if self.attempt >= self.config.max_attempts {
            return false;
        }
        match self.last_attempt_at {
            None => true,
            Some(last) => {
                now.signed_duration_since(last).num_milliseconds() >= self.cooldown_ms() as i64
            }
        }
    }

    /// Rotation delay after a failure, bucketed by the attempt counter.
    pub fn retry_delay_ms(&self) -> u64 {
        match self.attempt {
            0..=2 => self.config.short_delay_ms,
            3..=4 => self.config.medium_delay_ms,
            _ => self.config.long_delay_ms,
        }
    }

    /// Time until admission can succeed, considering both the cooldown
    /// window and an active freeze. Zero when admission is open now.
    pub fn remaining_wait_ms(&self, now: DateTime<Utc>) -> u64 {
        let cooldown_wait = match self.last_attempt_at {
            None => 0,
            Some(last) => {
                let elapsed = now.signed_duration_since(last).num_milliseconds().max(0) as u64;
                self.cooldown_ms().saturating_sub(elapsed)
            }
        };
        let freeze_wait = match self.frozen_until {
            Some(until) if self.attempt >= self.config.max_attempts => {
                until.signed_duration_since(now).num_milliseconds().max(0) as u64
            }
            _ => 0,
        };
        cooldown_wait.max(freeze_wait)
    }

    /// Raise the cooldown tier. Sticky: stays raised until [`Self::reset`].
    pub fn escalate(&mut self) {
        self.tier = CooldownTier::Elevated;
    }

    /// Zero the counters: successful spawn or an operator-triggered
    /// rotation. Clears the freeze and drops the tier back to baseline.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.tier = CooldownTier::Baseline;
        self.frozen_until = None;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen_until.is_some() && self.attempt >= self.config.max_attempts
    }

    /// Deadline for the one-shot freeze reset, if armed.
    pub fn thaw_deadline(&self) -> Option<DateTime<Utc>> {
        if self.is_frozen() { self.frozen_until } else { None }
    }

    /// Fire the one-shot freeze reset if its deadline has passed.
    ///
    /// Returns `true` only on the firing call; re-invoking afterwards is
    /// a no-op until the ceiling is reached again.
    pub fn try_thaw(&mut self, now: DateTime<Utc>) -> bool {
        match self.frozen_until {
            Some(until) if self.attempt >= self.config.max_attempts && now >= until => {
                self.attempt = 0;
                self.frozen_until = None;
                true
            }
            _ => false,
        }
    }
}

// ─── Throttle detection ───────────────────────────────────────────

/// Keywords in kick/error text that imply server-side throttling.
const THROTTLE_HINTS: [&str; 7] = [
    "throttle",
    "too fast",
    "rate",
    "timed out",
    "timeout",
    "wait",
    "banned temporarily",
];

/// Heuristic scan of terminal detail text for throttle/timeout hints.
///
/// False negatives degrade to the baseline cooldown, which is safe.
pub fn is_throttle_hint(detail: &str) -> bool {
    let lower = detail.to_lowercase();
    THROTTLE_HINTS.iter().any(|hint| lower.contains(hint))
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .expect("valid RFC3339")
            .with_timezone(&Utc)
    }

    fn t0() -> DateTime<Utc> {
        ts("2026-03-01T12:00:00Z")
    }

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy::new(ReconnectConfig::default())
    }

    // ── Admission window ────────────────────────────────────────

    #[test]
    fn fresh_policy_admits_immediately() {
        assert!(policy().can_connect(t0()));
    }

    #[test]
    fn admission_denied_until_cooldown_elapses() {
        let mut p = policy();
        p.record_attempt(t0());

        assert!(!p.can_connect(t0()));
        assert!(!p.can_connect(t0() + TimeDelta::milliseconds(9_999)));
        assert!(p.can_connect(t0() + TimeDelta::milliseconds(10_000)));
        assert!(p.can_connect(t0() + TimeDelta::milliseconds(10_001)));
    }

    #[test]
    fn remaining_wait_counts_down_to_zero() {
        let mut p = policy();
        p.record_attempt(t0());
        assert_eq!(p.remaining_wait_ms(t0()), 10_000);
        assert_eq!(p.remaining_wait_ms(t0() + TimeDelta::milliseconds(4_000)), 6_000);
        assert_eq!(p.remaining_wait_ms(t0() + TimeDelta::milliseconds(10_000)), 0);
        assert_eq!(p.remaining_wait_ms(t0() + TimeDelta::milliseconds(30_000)), 0);
    }

    // ── Tiered backoff ──────────────────────────────────────────

    #[test]
    fn retry_delay_buckets_by_attempt() {
        let mut p = policy();
        let mut t = t0();

        // attempts 1-2 → short
        p.record_attempt(t);
        assert_eq!(p.retry_delay_ms(), 5_000);
        t += TimeDelta::seconds(60);
        p.record_attempt(t);
        assert_eq!(p.retry_delay_ms(), 5_000);

        // attempts 3-4 → medium
        t += TimeDelta::seconds(60);
        p.record_attempt(t);
        assert_eq!(p.retry_delay_ms(), 30_000);
        t += TimeDelta::seconds(60);
        p.record_attempt(t);
        assert_eq!(p.retry_delay_ms(), 30_000);

        // attempts 5+ → long
        t += TimeDelta::seconds(60);
        p.record_attempt(t);
        assert_eq!(p.retry_delay_ms(), 120_000);
        t += TimeDelta::seconds(60);
        p.record_attempt(t);
        assert_eq!(p.retry_delay_ms(), 120_000);
    }

    // ── Sticky escalation ───────────────────────────────────────

    #[test]
    fn escalation_raises_cooldown_and_sticks() {
        let mut p = policy();
        assert_eq!(p.cooldown_ms(), 10_000);

        p.escalate();
        assert_eq!(p.tier(), CooldownTier::Elevated);
        assert_eq!(p.cooldown_ms(), 60_000);

        // Another attempt does not recompute the tier from scratch.
        p.record_attempt(t0());
        assert_eq!(p.cooldown_ms(), 60_000);
        assert!(!p.can_connect(t0() + TimeDelta::milliseconds(10_001)));
        assert!(p.can_connect(t0() + TimeDelta::milliseconds(60_001)));
    }

    #[test]
    fn reset_drops_tier_back_to_baseline() {
        let mut p = policy();
        p.escalate();
        p.record_attempt(t0());
        p.reset();
        assert_eq!(p.tier(), CooldownTier::Baseline);
        assert_eq!(p.attempt(), 0);
        assert!(p.can_connect(t0() + TimeDelta::milliseconds(10_000)));
    }

    // ── Freeze & thaw ───────────────────────────────────────────

    #[test]
    fn attempt_ceiling_freezes_admission() {
        let mut p = policy();
        let mut t = t0();
        for _ in 0..8 {
            p.record_attempt(t);
            t += TimeDelta::seconds(120);
        }
        assert!(p.is_frozen());
        // Cooldown long elapsed, still denied: the ceiling holds.
        assert!(!p.can_connect(t + TimeDelta::seconds(120)));
    }

    #[test]
    fn thaw_fires_exactly_once() {
        let mut p = policy();
        let mut t = t0();
        for _ in 0..8 {
            p.record_attempt(t);
            t += TimeDelta::seconds(1);
        }
        let deadline = p.thaw_deadline().expect("freeze armed");

        // Before the deadline: nothing happens.
        assert!(!p.try_thaw(deadline - TimeDelta::seconds(1)));
        assert!(p.is_frozen());

        // At the deadline: counter zeroed once.
        assert!(p.try_thaw(deadline));
        assert_eq!(p.attempt(), 0);
        assert!(!p.is_frozen());

        // Idempotent re-arm: a second call is a no-op.
        assert!(!p.try_thaw(deadline + TimeDelta::seconds(1)));
        assert_eq!(p.attempt(), 0);
    }

    #[test]
    fn freeze_deadline_set_at_ceiling_not_extended() {
        let mut p = policy();
        let mut t = t0();
        for _ in 0..8 {
            p.record_attempt(t);
            t += TimeDelta::seconds(1);
        }
        let first = p.thaw_deadline().expect("armed");

        // Further attempt recording must not push the deadline out.
        p.record_attempt(t + TimeDelta::seconds(5));
        assert_eq!(p.thaw_deadline(), Some(first));
    }

    #[test]
    fn remaining_wait_covers_freeze() {
        let mut p = ReconnectPolicy::new(ReconnectConfig {
            max_attempts: 2,
            freeze_reset_ms: 100_000,
            ..Default::default()
        });
        p.record_attempt(t0());
        p.record_attempt(t0() + TimeDelta::seconds(20));
        assert!(p.is_frozen());
        // Freeze dominates the cooldown window.
        let wait = p.remaining_wait_ms(t0() + TimeDelta::seconds(30));
        assert_eq!(wait, 90_000);
    }

    #[test]
    fn admission_reopens_after_thaw_and_cooldown() {
        let mut p = ReconnectPolicy::new(ReconnectConfig {
            max_attempts: 2,
            freeze_reset_ms: 60_000,
            ..Default::default()
        });
        p.record_attempt(t0());
        p.record_attempt(t0() + TimeDelta::seconds(15));
        assert!(!p.can_connect(t0() + TimeDelta::seconds(90)));

        let thaw_at = t0() + TimeDelta::seconds(75);
        assert!(p.try_thaw(thaw_at));
        assert!(p.can_connect(thaw_at));
    }

    // ── Throttle hints ──────────────────────────────────────────

    #[test]
    fn throttle_hints_match_known_phrases() {
        assert!(is_throttle_hint("Connection throttled! Please wait"));
        assert!(is_throttle_hint("You are logging in too fast"));
        assert!(is_throttle_hint("read timed out"));
        assert!(is_throttle_hint("Rate limited"));
    }

    #[test]
    fn non_throttle_text_does_not_match() {
        assert!(!is_throttle_hint("You have been kicked by an operator"));
        assert!(!is_throttle_hint("Server closed"));
        assert!(!is_throttle_hint(""));
    }
}
