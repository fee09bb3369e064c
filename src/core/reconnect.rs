// src/core/reconnect.rs

//! The reconnect policy: decides whether, and after how long, the session
//! should reconnect after it lost its connection.

use crate::core::session::DisconnectReason;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// The default delay before reconnecting after a network failure.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);
/// The default ceiling for exponential backoff.
pub const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// How the delay grows between consecutive attempts.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Every attempt waits `delay`.
    #[default]
    Fixed,
    /// Attempt `n` waits `delay * 2^n`, capped at `max_delay`.
    Exponential,
}

/// The outcome of consulting the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    Retry(Duration),
    GiveUp,
}

/// Reconnect bookkeeping since the last successful logon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
    last_attempt: Option<Instant>,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconnects scheduled since the last successful logon.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_attempt(&self) -> Option<Instant> {
        self.last_attempt
    }
}

/// Reconnect settings. The default retries every 2 seconds, forever: network
/// partitions are expected to be transient for an interactive client.
/// Headless deployments should set `max_attempts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    pub backoff: Backoff,
    pub max_delay: Duration,
    /// Upper bound of a random delay added to every retry. Zero disables it.
    pub jitter: Duration,
    /// `None` retries without limit.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RECONNECT_DELAY,
            backoff: Backoff::Fixed,
            max_delay: DEFAULT_MAX_RECONNECT_DELAY,
            jitter: Duration::ZERO,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// A policy that retries every `delay`, without limit.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Pure decision for a disconnect with the given cause, after
    /// `attempt_count` reconnects have already been made.
    ///
    /// Only network failures are retried. A user-initiated disconnect means
    /// the owner asked us to stop, and an authentication failure cannot be
    /// fixed by reconnecting with a credential the service already consumed.
    pub fn decide(&self, reason: &DisconnectReason, attempt_count: u32) -> ReconnectDecision {
        if *reason != DisconnectReason::NetworkFailure {
            return ReconnectDecision::GiveUp;
        }

        if let Some(max_attempts) = self.max_attempts
            && attempt_count >= max_attempts
        {
            return ReconnectDecision::GiveUp;
        }

        let delay = match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt_count.min(31));
                self.delay.saturating_mul(factor).min(self.max_delay)
            }
        };
        ReconnectDecision::Retry(delay)
    }

    /// Consults `decide` and records the attempt in `retry` when retrying.
    /// Jitter is applied here so that `decide` stays deterministic.
    pub fn next_attempt(&self, reason: &DisconnectReason, retry: &mut RetryState) -> ReconnectDecision {
        match self.decide(reason, retry.attempts) {
            ReconnectDecision::Retry(delay) => {
                retry.attempts = retry.attempts.saturating_add(1);
                retry.last_attempt = Some(Instant::now());
                ReconnectDecision::Retry(delay + self.random_jitter())
            }
            ReconnectDecision::GiveUp => ReconnectDecision::GiveUp,
        }
    }

    /// Clears the retry bookkeeping after a successful logon.
    pub fn reset(&self, retry: &mut RetryState) {
        *retry = RetryState::default();
    }

    fn random_jitter(&self) -> Duration {
        let max_ms = self.jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}
