// src/core/session/notify.rs

//! Status notifications surfaced to the session owner.

use super::state::{ConnectionState, DisconnectReason};
use crate::core::callbacks::HandlerFailure;
use crate::core::enums::EResult;
use crate::core::errors::{AuthenticationError, SubscriptionCloseError, TransportError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Everything the controller reports about the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    Connected,
    LoggingOn {
        username: String,
        login_id: u32,
    },
    LogonSucceeded,
    LogonRejected(AuthenticationError),
    LoggedOff(EResult),
    Disconnected(DisconnectReason),
    ReconnectScheduled {
        attempt: u32,
        delay: Duration,
    },
    ReconnectAbandoned {
        attempts: u32,
    },
    ReconnectCancelled,
    CredentialsExhausted,
    TransportFailed(TransportError),
    HandlerFailed(HandlerFailure),
    SubscriptionCloseFailed(SubscriptionCloseError),
    RequestIgnored {
        request: &'static str,
        state: ConnectionState,
    },
}

/// The output the controller reports notifications to.
pub trait StatusSink: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Reports every notification as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn notify(&self, notification: &Notification) {
        match notification {
            Notification::StateChanged { from, to } => {
                info!("Session state changed: {} -> {}", from, to)
            }
            Notification::Connected => info!("Connected to the service."),
            Notification::LoggingOn { username, login_id } => {
                info!("Logging on as {} (login id {})...", username, login_id)
            }
            Notification::LogonSucceeded => info!("Successfully logged on."),
            Notification::LogonRejected(e) => error!("Unable to log on: {}", e),
            Notification::LoggedOff(result) => info!("Logged off: {}", result),
            Notification::Disconnected(reason) => info!("Disconnected: {}", reason),
            Notification::ReconnectScheduled { attempt, delay } => {
                warn!("Reconnect attempt {} scheduled in {:?}.", attempt, delay)
            }
            Notification::ReconnectAbandoned { attempts } => {
                error!("Giving up after {} reconnect attempts.", attempts)
            }
            Notification::ReconnectCancelled => info!("Pending reconnect cancelled."),
            Notification::CredentialsExhausted => {
                error!("No unused credential left to log on with.")
            }
            Notification::TransportFailed(e) => warn!("Transport error: {}", e),
            Notification::HandlerFailed(failure) => error!(
                "Callback handler #{} for {} failed: {}",
                failure.subscription_id, failure.kind, failure.error
            ),
            Notification::SubscriptionCloseFailed(e) => warn!("{}", e),
            Notification::RequestIgnored { request, state } => {
                warn!("Ignoring {} request in state {}.", request, state)
            }
        }
    }
}

/// Forwards notifications to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl StatusSink for ChannelSink {
    fn notify(&self, notification: &Notification) {
        // The receiver may have been dropped; the session continues regardless.
        let _ = self.sender.send(notification.clone());
    }
}
