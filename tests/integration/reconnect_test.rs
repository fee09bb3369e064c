// tests/integration/reconnect_test.rs

//! Integration tests for the reconnect policy

use std::time::Duration;
use tether::core::enums::EResult;
use tether::core::reconnect::{Backoff, ReconnectDecision, ReconnectPolicy, RetryState};
use tether::core::session::DisconnectReason;
use tether::core::session::logon::LogonResult;

fn exponential(delay_ms: u64, max_ms: u64) -> ReconnectPolicy {
    ReconnectPolicy {
        delay: Duration::from_millis(delay_ms),
        backoff: Backoff::Exponential,
        max_delay: Duration::from_millis(max_ms),
        ..ReconnectPolicy::default()
    }
}

#[test]
fn test_default_retries_network_failures_forever() {
    let policy = ReconnectPolicy::default();

    for attempts in [0, 1, 10, 10_000] {
        assert_eq!(
            policy.decide(&DisconnectReason::NetworkFailure, attempts),
            ReconnectDecision::Retry(Duration::from_secs(2))
        );
    }
}

#[test]
fn test_terminal_reasons_give_up() {
    let policy = ReconnectPolicy::default();
    let reasons = [
        DisconnectReason::UserInitiated,
        DisconnectReason::AuthenticationRejected(LogonResult::failed(
            EResult::InvalidPassword,
            None,
        )),
        DisconnectReason::LoggedOff(EResult::LoggedInElsewhere),
        DisconnectReason::CredentialsExhausted,
    ];

    for reason in reasons {
        assert!(reason.is_terminal());
        assert_eq!(policy.decide(&reason, 0), ReconnectDecision::GiveUp);
    }
}

#[test]
fn test_max_attempts_cap() {
    let policy = ReconnectPolicy::fixed(Duration::from_millis(500)).with_max_attempts(3);

    assert_eq!(
        policy.decide(&DisconnectReason::NetworkFailure, 2),
        ReconnectDecision::Retry(Duration::from_millis(500))
    );
    assert_eq!(
        policy.decide(&DisconnectReason::NetworkFailure, 3),
        ReconnectDecision::GiveUp
    );
}

#[test]
fn test_exponential_backoff_is_capped() {
    let policy = exponential(1000, 10_000);
    let expected = [1000, 2000, 4000, 8000, 10_000, 10_000];

    for (attempts, ms) in expected.into_iter().enumerate() {
        assert_eq!(
            policy.decide(&DisconnectReason::NetworkFailure, attempts as u32),
            ReconnectDecision::Retry(Duration::from_millis(ms))
        );
    }
    assert_eq!(
        policy.decide(&DisconnectReason::NetworkFailure, u32::MAX),
        ReconnectDecision::Retry(Duration::from_millis(10_000))
    );
}

#[test]
fn test_next_attempt_counts_and_reset_clears() {
    let policy = ReconnectPolicy::fixed(Duration::from_secs(1)).with_max_attempts(2);
    let mut retry = RetryState::new();

    assert!(matches!(
        policy.next_attempt(&DisconnectReason::NetworkFailure, &mut retry),
        ReconnectDecision::Retry(_)
    ));
    assert_eq!(retry.attempts(), 1);
    assert!(retry.last_attempt().is_some());

    policy.next_attempt(&DisconnectReason::NetworkFailure, &mut retry);
    assert_eq!(
        policy.next_attempt(&DisconnectReason::NetworkFailure, &mut retry),
        ReconnectDecision::GiveUp
    );
    assert_eq!(retry.attempts(), 2);

    policy.reset(&mut retry);
    assert_eq!(retry, RetryState::default());
}

#[test]
fn test_give_up_does_not_count_an_attempt() {
    let policy = ReconnectPolicy::default();
    let mut retry = RetryState::new();

    policy.next_attempt(&DisconnectReason::UserInitiated, &mut retry);

    assert_eq!(retry.attempts(), 0);
}

#[test]
fn test_jitter_stays_within_bounds() {
    let policy = ReconnectPolicy {
        jitter: Duration::from_millis(100),
        ..ReconnectPolicy::fixed(Duration::from_secs(1))
    };

    for _ in 0..50 {
        let mut retry = RetryState::new();
        match policy.next_attempt(&DisconnectReason::NetworkFailure, &mut retry) {
            ReconnectDecision::Retry(delay) => {
                assert!(delay >= Duration::from_secs(1));
                assert!(delay <= Duration::from_millis(1100));
            }
            ReconnectDecision::GiveUp => panic!("network failures must be retried"),
        }
    }
}
