// src/core/session/mod.rs

//! The session controller: drives one long-lived authenticated connection
//! through connect, logon, logoff and reconnect.
//!
//! `SessionController::run` owns the event loop. Transport events are turned
//! into callbacks and published through a `CallbackManager`; the controller's
//! own handlers are registered first and update the `SessionContext`, then
//! owner handlers run. Transport calls requested during a delivery are made
//! once that delivery completes. Other tasks control a running session
//! through a cloneable `SessionHandle`.

use crate::config::{Config, SessionConfig};
use crate::core::callbacks::{
    Callback, CallbackKind, CallbackManager, Subscription, SubscriptionSet,
};
use crate::core::errors::{HandlerError, SessionError, TransportError};
use crate::core::metrics;
use crate::core::transport::{Transport, TransportConfig, TransportEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

mod context;
mod handlers;
pub mod logon;
pub mod notify;
mod state;

pub use context::SessionContext;
pub use state::{ConnectionState, DisconnectReason};

use context::Action;
use logon::{CredentialSource, LogonRequest};
use notify::{Notification, StatusSink};

/// A request sent to a running controller through a `SessionHandle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionRequest {
    Stop,
    LogOff,
}

/// A cloneable, thread-safe way to control a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    requests: mpsc::UnboundedSender<SessionRequest>,
}

impl SessionHandle {
    /// Requests a graceful shutdown: a pending reconnect is cancelled and an
    /// existing connection is closed. `run` then returns.
    pub fn stop(&self) {
        self.send(SessionRequest::Stop);
    }

    /// Requests a logoff. Ignored unless the session is logged on.
    pub fn log_off(&self) {
        self.send(SessionRequest::LogOff);
    }

    fn send(&self, request: SessionRequest) {
        if self.requests.send(request).is_err() {
            debug!("Session controller is gone; dropping {:?} request.", request);
        }
    }
}

/// `SessionController` runs one session over a `Transport`.
pub struct SessionController<T: Transport> {
    settings: SessionConfig,
    transport_config: TransportConfig,
    transport: T,
    events: mpsc::Receiver<TransportEvent>,
    dispatcher: CallbackManager<SessionContext>,
    /// The controller's own handler registrations.
    subscriptions: SubscriptionSet,
    requests_tx: mpsc::UnboundedSender<SessionRequest>,
    requests_rx: mpsc::UnboundedReceiver<SessionRequest>,
    ctx: SessionContext,
}

impl<T: Transport> SessionController<T> {
    /// Creates an idle controller. `events` is the receiving end of the
    /// channel `transport` emits its events on.
    pub fn new(
        config: &Config,
        transport: T,
        events: mpsc::Receiver<TransportEvent>,
        credentials: Box<dyn CredentialSource>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let dispatcher = CallbackManager::new();
        let subscriptions = Self::register_handlers(&dispatcher);
        let ctx = SessionContext::new(
            config.reconnect.clone(),
            credentials,
            sink,
            &config.session,
        );

        Self {
            settings: config.session.clone(),
            transport_config: config.transport.clone(),
            transport,
            events,
            dispatcher,
            subscriptions,
            requests_tx,
            requests_rx,
            ctx,
        }
    }

    fn register_handlers(dispatcher: &CallbackManager<SessionContext>) -> SubscriptionSet {
        let mut subscriptions = SubscriptionSet::new();
        subscriptions.push(dispatcher.subscribe(CallbackKind::Connected, handlers::on_connected));
        subscriptions.push(
            dispatcher.subscribe(CallbackKind::Disconnected, handlers::on_disconnected),
        );
        subscriptions.push(dispatcher.subscribe(CallbackKind::LoggedOn, handlers::on_logged_on));
        subscriptions.push(dispatcher.subscribe(CallbackKind::LoggedOff, handlers::on_logged_off));
        subscriptions
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            requests: self.requests_tx.clone(),
        }
    }

    /// Registers an owner handler. Owner handlers run after the controller's
    /// own handler for the same callback and see the updated state.
    pub fn subscribe<F>(&self, kind: CallbackKind, handler: F) -> Subscription
    where
        F: Fn(&mut SessionContext, &Callback) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(kind, handler)
    }

    pub fn state(&self) -> ConnectionState {
        self.ctx.state()
    }

    /// The number of handlers currently registered with the dispatcher,
    /// including the controller's own while it can still run.
    pub fn open_subscriptions(&self) -> usize {
        self.dispatcher.subscriber_count()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Connects, logs on and processes events until the session ends, then
    /// returns the final state. Returns an error only if the session could
    /// not be started.
    pub async fn run(&mut self) -> Result<ConnectionState, SessionError> {
        if self.ctx.state() != ConnectionState::Idle {
            return Err(SessionError::NotIdle(self.ctx.state()));
        }
        if let Err(e) = self.transport_config.validate() {
            self.release_subscriptions();
            return Err(e);
        }

        info!("Starting session.");
        self.ctx.transition(ConnectionState::Connecting);
        self.ctx.actions.push_back(Action::Connect);
        self.perform_actions().await;

        let wait_timeout = self.settings.wait_timeout;
        while !self.ctx.finished {
            let reconnect_at = self.ctx.reconnect_at;
            let stop_deadline = self.ctx.stop_deadline;

            tokio::select! {
                biased;
                Some(request) = self.requests_rx.recv() => self.apply_request(request),
                _ = sleep_until(stop_deadline) => self.ctx.shutdown_timed_out(),
                _ = sleep_until(reconnect_at) => self.ctx.begin_reconnect(),
                batch = next_batch(&mut self.events, wait_timeout) => match batch {
                    Some(events) => {
                        for event in events {
                            self.dispatch(event);
                            self.perform_actions().await;
                            if self.ctx.finished {
                                debug!("Session finished; dropping the rest of the batch.");
                                break;
                            }
                        }
                    }
                    None => {
                        self.ctx
                            .notify(Notification::TransportFailed(TransportError::EventStreamClosed));
                        self.ctx.event_stream_closed();
                    }
                },
            }

            self.perform_actions().await;
        }

        self.release_subscriptions();
        info!("Session ended: {}", self.ctx.state());
        Ok(self.ctx.state())
    }

    fn apply_request(&mut self, request: SessionRequest) {
        match request {
            SessionRequest::Stop => self.ctx.actions.push_back(Action::Stop),
            SessionRequest::LogOff => self.ctx.actions.push_back(Action::LogOff),
        }
    }

    /// Publishes one transport event to every subscribed handler.
    fn dispatch(&mut self, event: TransportEvent) {
        let callback = Callback::from(event);
        debug!("Dispatching {} callback.", callback.kind());

        let report = self.dispatcher.publish(&mut self.ctx, &callback);
        for failure in report.failures {
            self.ctx.notify(Notification::HandlerFailed(failure));
        }
    }

    /// Performs the transport calls queued by handlers and requests.
    async fn perform_actions(&mut self) {
        while let Some(action) = self.ctx.actions.pop_front() {
            match action {
                Action::Connect => self.connect().await,
                Action::Disconnect => {
                    if let Err(e) = self.transport.disconnect().await {
                        self.ctx.notify(Notification::TransportFailed(e));
                    }
                }
                Action::Logon(request) => self.log_on(request).await,
                Action::LogOff => self.log_off().await,
                Action::Stop => self.ctx.begin_stop(),
            }
        }
    }

    async fn connect(&mut self) {
        metrics::CONNECT_ATTEMPTS_TOTAL.inc();
        if let Err(e) = self.transport.connect().await {
            self.ctx.notify(Notification::TransportFailed(e));
            // A connection that never started is handled like one the
            // network dropped.
            self.ctx.connection_lost(false);
        }
    }

    async fn log_on(&mut self, request: LogonRequest) {
        if self.ctx.state() != ConnectionState::LoggingOn {
            debug!("Dropping logon request; state is {}.", self.ctx.state());
            return;
        }
        // The request is consumed here whatever the outcome.
        if let Err(e) = self.transport.send_logon(&request).await {
            self.ctx.notify(Notification::TransportFailed(e));
            self.ctx.actions.push_back(Action::Disconnect);
        }
    }

    async fn log_off(&mut self) {
        let state = self.ctx.state();
        if state != ConnectionState::LoggedOn || self.ctx.stop_requested {
            self.ctx.notify(Notification::RequestIgnored {
                request: "log off",
                state,
            });
            return;
        }

        self.ctx.transition(ConnectionState::LoggingOff);
        if let Err(e) = self.transport.send_logoff().await {
            warn!("Failed to send logoff; closing the connection instead.");
            self.ctx.notify(Notification::TransportFailed(e));
            self.ctx.begin_stop();
        }
    }

    fn release_subscriptions(&mut self) {
        for error in self.subscriptions.close_all() {
            self.ctx.notify(Notification::SubscriptionCloseFailed(error));
        }
    }
}

/// Waits up to `timeout` for the first event, then drains whatever else is
/// already queued. Returns an empty batch on timeout and `None` once the
/// transport dropped its sender.
async fn next_batch(
    events: &mut mpsc::Receiver<TransportEvent>,
    timeout: Duration,
) -> Option<Vec<TransportEvent>> {
    let first = match tokio::time::timeout(timeout, events.recv()).await {
        Err(_) => return Some(Vec::new()),
        Ok(None) => return None,
        Ok(Some(event)) => event,
    };

    let mut batch = vec![first];
    while let Ok(event) = events.try_recv() {
        batch.push(event);
    }
    Some(batch)
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
