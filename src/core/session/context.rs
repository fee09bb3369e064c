// src/core/session/context.rs

//! The mutable session state lent to callback handlers during dispatch.

use super::logon::{CredentialSource, LogonRequest};
use super::notify::{Notification, StatusSink};
use super::state::{ConnectionState, DisconnectReason};
use crate::config::SessionConfig;
use crate::core::metrics;
use crate::core::reconnect::{ReconnectDecision, ReconnectPolicy, RetryState};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error};

/// A transport call requested by a handler. Handlers run synchronously, so
/// they queue calls and the controller performs them once the current
/// callback has been delivered to every subscriber.
#[derive(Debug)]
pub(crate) enum Action {
    Connect,
    Disconnect,
    Logon(LogonRequest),
    LogOff,
    Stop,
}

/// Session state owned by the controller. Handlers receive it mutably, but
/// outside this crate it only exposes read access and requests.
pub struct SessionContext {
    pub(crate) state: ConnectionState,
    pub(crate) retry: RetryState,
    pub(crate) policy: ReconnectPolicy,
    pub(crate) credentials: Box<dyn CredentialSource>,
    pub(crate) sink: Arc<dyn StatusSink>,
    pub(crate) actions: VecDeque<Action>,
    /// Set once the owner asked to stop. Any disconnect after this point is
    /// user-initiated.
    pub(crate) stop_requested: bool,
    pub(crate) logon_outstanding: bool,
    /// Set when the session reached its terminal state; `run` returns.
    pub(crate) finished: bool,
    pub(crate) reconnect_at: Option<Instant>,
    pub(crate) stop_deadline: Option<Instant>,
    pub(crate) shutdown_timeout: Duration,
    /// Correlation id for requests that do not carry their own.
    pub(crate) default_login_id: u32,
}

impl SessionContext {
    pub(crate) fn new(
        policy: ReconnectPolicy,
        credentials: Box<dyn CredentialSource>,
        sink: Arc<dyn StatusSink>,
        settings: &SessionConfig,
    ) -> Self {
        Self {
            state: ConnectionState::Idle,
            retry: RetryState::new(),
            policy,
            credentials,
            sink,
            actions: VecDeque::new(),
            stop_requested: false,
            logon_outstanding: false,
            finished: false,
            reconnect_at: None,
            stop_deadline: None,
            shutdown_timeout: settings.shutdown_timeout,
            default_login_id: settings.login_id,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn retry_state(&self) -> &RetryState {
        &self.retry
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// True while a logon request awaits its answer.
    pub fn is_logon_outstanding(&self) -> bool {
        self.logon_outstanding
    }

    /// Asks the controller to log off once the current callback has been
    /// delivered. Ignored unless the session is logged on at that point.
    pub fn request_log_off(&mut self) {
        self.actions.push_back(Action::LogOff);
    }

    /// Asks the controller to shut the session down.
    pub fn request_stop(&mut self) {
        self.actions.push_back(Action::Stop);
    }

    pub(crate) fn notify(&self, notification: Notification) {
        self.sink.notify(&notification);
    }

    /// Moves to `to` if it directly follows the current state.
    pub(crate) fn transition(&mut self, to: ConnectionState) -> bool {
        if !self.state.can_transition_to(&to) {
            error!("Refusing illegal state transition {} -> {}.", self.state, to);
            return false;
        }
        let from = std::mem::replace(&mut self.state, to);
        self.notify(Notification::StateChanged { from, to });
        true
    }

    /// Ends the connection with a terminal cause; `run` returns afterwards.
    pub(crate) fn terminate(&mut self, reason: DisconnectReason) {
        if self.state.disconnect_reason() != Some(reason) {
            self.transition(ConnectionState::Disconnected(reason));
        }
        self.finish();
    }

    pub(crate) fn finish(&mut self) {
        self.finished = true;
        self.reconnect_at = None;
        self.stop_deadline = None;
        self.logon_outstanding = false;
    }

    /// Records a lost connection and decides what happens next.
    pub(crate) fn connection_lost(&mut self, user_initiated: bool) {
        self.logon_outstanding = false;

        if self.finished {
            debug!("Ignoring disconnect after the session finished.");
            return;
        }
        if !self.state.is_connected() {
            debug!("Ignoring disconnect in state {}.", self.state);
            return;
        }

        // Dropping the connection is how the service completes a logoff.
        let expected = self.stop_requested || self.state == ConnectionState::LoggingOff;
        let reason = if user_initiated || expected {
            DisconnectReason::UserInitiated
        } else {
            DisconnectReason::NetworkFailure
        };

        self.transition(ConnectionState::Disconnected(reason));
        self.notify(Notification::Disconnected(reason));

        if reason.is_terminal() {
            self.finish();
        } else {
            self.schedule_reconnect(reason);
        }
    }

    fn schedule_reconnect(&mut self, reason: DisconnectReason) {
        match self.policy.next_attempt(&reason, &mut self.retry) {
            ReconnectDecision::Retry(delay) => {
                metrics::RECONNECTS_SCHEDULED_TOTAL.inc();
                self.notify(Notification::ReconnectScheduled {
                    attempt: self.retry.attempts(),
                    delay,
                });
                self.reconnect_at = Some(Instant::now() + delay);
            }
            ReconnectDecision::GiveUp => {
                self.notify(Notification::ReconnectAbandoned {
                    attempts: self.retry.attempts(),
                });
                self.finish();
            }
        }
    }

    /// Fires a due reconnect.
    pub(crate) fn begin_reconnect(&mut self) {
        self.reconnect_at = None;
        if self.finished || self.stop_requested {
            return;
        }
        if self.transition(ConnectionState::Connecting) {
            self.actions.push_back(Action::Connect);
        }
    }

    /// Starts a graceful shutdown. Safe to call repeatedly.
    pub(crate) fn begin_stop(&mut self) {
        if self.finished || self.stop_requested {
            return;
        }
        self.stop_requested = true;

        if self.state.is_connected() {
            debug!("Stop requested in state {}, disconnecting.", self.state);
            self.stop_deadline = Some(Instant::now() + self.shutdown_timeout);
            self.actions.push_back(Action::Disconnect);
            return;
        }

        // Waiting for a scheduled reconnect: cancel it and finish right away.
        if self.reconnect_at.take().is_some() {
            self.notify(Notification::ReconnectCancelled);
        }
        self.terminate(DisconnectReason::UserInitiated);
    }

    /// The transport never confirmed the disconnect requested by `stop`.
    pub(crate) fn shutdown_timed_out(&mut self) {
        self.stop_deadline = None;
        if self.finished {
            return;
        }
        error!(
            "Transport did not report a disconnect within {:?}; finishing anyway.",
            self.shutdown_timeout
        );
        self.notify(Notification::Disconnected(DisconnectReason::UserInitiated));
        self.terminate(DisconnectReason::UserInitiated);
    }

    /// No more transport events can arrive.
    pub(crate) fn event_stream_closed(&mut self) {
        if self.finished {
            return;
        }
        let reason = if self.stop_requested {
            DisconnectReason::UserInitiated
        } else {
            DisconnectReason::NetworkFailure
        };
        if self.state.is_connected() {
            self.transition(ConnectionState::Disconnected(reason));
            self.notify(Notification::Disconnected(reason));
        } else if reason.is_terminal() {
            self.transition(ConnectionState::Disconnected(reason));
        }
        self.finish();
    }
}
