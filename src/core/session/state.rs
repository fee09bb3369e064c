// src/core/session/state.rs

//! The connection state machine.

use crate::core::enums::EResult;
use crate::core::session::logon::LogonResult;
use std::fmt;

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The session owner asked to stop.
    UserInitiated,
    /// The connection failed or was closed by the network or the server.
    NetworkFailure,
    /// The service rejected the logon.
    AuthenticationRejected(LogonResult),
    /// The service ended a logged-on session we did not ask to end.
    LoggedOff(EResult),
    /// A reconnect succeeded but no unused credential was left to log on with.
    CredentialsExhausted,
}

impl DisconnectReason {
    /// True for causes after which the session must never reconnect.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DisconnectReason::NetworkFailure)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::UserInitiated => f.write_str("user initiated"),
            DisconnectReason::NetworkFailure => f.write_str("network failure"),
            DisconnectReason::AuthenticationRejected(result) => {
                write!(f, "authentication rejected ({result})")
            }
            DisconnectReason::LoggedOff(result) => write!(f, "logged off by server ({result})"),
            DisconnectReason::CredentialsExhausted => f.write_str("credentials exhausted"),
        }
    }
}

/// The session's connection state. Exactly one value holds at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    LoggingOn,
    LoggedOn,
    LoggingOff,
    Disconnected(DisconnectReason),
}

impl ConnectionState {
    /// True while a connection exists or is being established.
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting
                | ConnectionState::Connected
                | ConnectionState::LoggingOn
                | ConnectionState::LoggedOn
                | ConnectionState::LoggingOff
        )
    }

    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        match self {
            ConnectionState::Disconnected(reason) => Some(*reason),
            _ => None,
        }
    }

    /// Whether `next` directly follows `self` on a single connection attempt.
    pub fn can_transition_to(&self, next: &ConnectionState) -> bool {
        use ConnectionState::*;

        match (self, next) {
            (Idle, Connecting)
            | (Connecting, Connected)
            | (Connected, LoggingOn)
            | (LoggingOn, LoggedOn)
            | (LoggedOn, LoggingOff) => true,
            (from, Disconnected(_)) if from.is_connected() => true,
            (Disconnected(DisconnectReason::NetworkFailure), Connecting) => true,
            // A pending reconnect cancelled by the owner.
            (Disconnected(DisconnectReason::NetworkFailure), Disconnected(reason)) => {
                reason.is_terminal()
            }
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Idle => f.write_str("Idle"),
            ConnectionState::Connecting => f.write_str("Connecting"),
            ConnectionState::Connected => f.write_str("Connected"),
            ConnectionState::LoggingOn => f.write_str("LoggingOn"),
            ConnectionState::LoggedOn => f.write_str("LoggedOn"),
            ConnectionState::LoggingOff => f.write_str("LoggingOff"),
            ConnectionState::Disconnected(reason) => write!(f, "Disconnected({reason})"),
        }
    }
}
