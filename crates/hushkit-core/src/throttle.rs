//! Unlock throttling
//!
//! Pure logic: no clocks, no storage, no globals. The caller passes the
//! current time in milliseconds, receives a new state value, and persists it
//! however it likes.
//!
//! ```text
//! failures:  0 ---- 1 ---- 2 ---------- 3 ------------ 4 ------------- 5 ...
//!                          human check  lockout 30s    lockout 60s     lockout 120s
//! ```
//!
//! A blocked attempt must be rejected before any key derivation runs.

use serde::{Deserialize, Serialize};

use crate::error::{HushError, Result};
use crate::primitives::random_below;

/// Throttle thresholds and backoff curve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottlePolicy {
    /// Failures after which a human check is demanded
    pub challenge_threshold: u32,
    /// Failures at which lockouts start
    pub lockout_threshold: u32,
    /// Cooldown at the lockout threshold, doubled per further failure
    pub base_cooldown_secs: u64,
    /// Cooldown ceiling
    pub max_cooldown_secs: u64,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            challenge_threshold: 2,
            lockout_threshold: 3,
            base_cooldown_secs: 30,
            max_cooldown_secs: 15 * 60,
        }
    }
}

/// Failure counter and lockout deadline. Timestamps are Unix milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockThrottleState {
    pub failures: u32,
    pub last_failure_at: u64,
    pub lockout_until: u64,
}

impl ThrottlePolicy {
    pub fn validate(&self) -> Result<()> {
        if self.challenge_threshold == 0 {
            return Err(HushError::Configuration(
                "challenge_threshold must be at least 1".into(),
            ));
        }
        if self.challenge_threshold >= self.lockout_threshold {
            return Err(HushError::Configuration(
                "challenge_threshold must be below lockout_threshold".into(),
            ));
        }
        if self.base_cooldown_secs == 0 || self.max_cooldown_secs < self.base_cooldown_secs {
            return Err(HushError::Configuration(
                "cooldowns must satisfy 0 < base_cooldown_secs <= max_cooldown_secs".into(),
            ));
        }
        Ok(())
    }

    /// `base * 2^(failures - lockout_threshold)`, capped; zero below the
    /// threshold.
    pub fn cooldown_seconds_for_failure_count(&self, failures: u32) -> u64 {
        if failures < self.lockout_threshold {
            return 0;
        }
        let doublings = failures - self.lockout_threshold;
        2u64.checked_pow(doublings)
            .and_then(|factor| self.base_cooldown_secs.checked_mul(factor))
            .map_or(self.max_cooldown_secs, |secs| secs.min(self.max_cooldown_secs))
    }

    pub fn apply_failure(&self, state: UnlockThrottleState, now: u64) -> UnlockThrottleState {
        let failures = state.failures.saturating_add(1);
        let cooldown_ms = self
            .cooldown_seconds_for_failure_count(failures)
            .saturating_mul(1000);
        let lockout_until = if cooldown_ms > 0 {
            state.lockout_until.max(now.saturating_add(cooldown_ms))
        } else {
            state.lockout_until
        };

        UnlockThrottleState {
            failures,
            last_failure_at: now,
            lockout_until,
        }
    }

    pub fn should_require_human_check(&self, state: &UnlockThrottleState) -> bool {
        state.failures >= self.challenge_threshold
    }
}

impl UnlockThrottleState {
    pub fn is_blocked(&self, now: u64) -> bool {
        now < self.lockout_until
    }

    pub fn remaining_lockout_ms(&self, now: u64) -> u64 {
        self.lockout_until.saturating_sub(now)
    }
}

pub fn create_unlock_throttle_state() -> UnlockThrottleState {
    UnlockThrottleState::default()
}

/// Record a failed unlock at `now` under the default policy.
pub fn apply_unlock_failure(state: UnlockThrottleState, now: u64) -> UnlockThrottleState {
    ThrottlePolicy::default().apply_failure(state, now)
}

pub fn cooldown_seconds_for_failure_count(failures: u32) -> u64 {
    ThrottlePolicy::default().cooldown_seconds_for_failure_count(failures)
}

pub fn is_unlock_blocked(state: &UnlockThrottleState, now: u64) -> bool {
    state.is_blocked(now)
}

pub fn remaining_lockout_ms(state: &UnlockThrottleState, now: u64) -> u64 {
    state.remaining_lockout_ms(now)
}

pub fn should_require_human_check(state: &UnlockThrottleState) -> bool {
    ThrottlePolicy::default().should_require_human_check(state)
}

/// Zero state. Call only after a verified successful unlock.
pub fn clear_unlock_failures() -> UnlockThrottleState {
    UnlockThrottleState::default()
}

/// Arithmetic challenge. Not `Clone`: verifying consumes it, so each
/// challenge is answered at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct HumanCheckChallenge {
    pub left: u32,
    pub right: u32,
    sum: u32,
}

impl HumanCheckChallenge {
    pub fn new(left: u32, right: u32) -> Self {
        Self {
            left,
            right,
            sum: left.saturating_add(right),
        }
    }

    pub fn prompt(&self) -> String {
        format!("What is {} + {}?", self.left, self.right)
    }
}

/// Fresh challenge with operands in 1..=9.
pub fn create_human_check_challenge() -> Result<HumanCheckChallenge> {
    let left = random_below(9)? + 1;
    let right = random_below(9)? + 1;
    Ok(HumanCheckChallenge::new(left, right))
}

/// Compare after trimming surrounding whitespace; anything that is not a
/// plain decimal equal to the sum is wrong.
pub fn verify_human_check(challenge: HumanCheckChallenge, answer: &str) -> bool {
    let normalized = answer.trim();
    let plain = !normalized.is_empty() && normalized.bytes().all(|b| b.is_ascii_digit());
    plain && normalized.parse::<u64>().ok() == Some(u64::from(challenge.sum))
}
