// tests/integration/test_helpers.rs

//! Test helpers and utilities for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tether::config::Config;
use tether::core::enums::EResult;
use tether::core::errors::TransportError;
use tether::core::session::SessionController;
use tether::core::session::logon::{Credential, LogonDetails, LogonRequest, LogonResult, StaticCredentials};
use tether::core::session::notify::{ChannelSink, Notification};
use tether::core::transport::{ServerMessage, Transport, TransportEvent, event_channel};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Initializes test logging once per process.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // Ignore the error if another test already installed a subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// A call the controller made on the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect,
    Disconnect,
    Logon {
        username: String,
        credential: Credential,
        login_id: u32,
    },
    Logoff,
}

/// How the scripted transport reacts to the controller's calls.
#[derive(Debug, Clone)]
pub struct Script {
    /// The first `connect_failures` connect calls return an error.
    pub connect_failures: u32,
    /// Whether logon requests are answered at all.
    pub answer_logons: bool,
    /// Answers to logon requests, in order. `Ok` once exhausted.
    pub logon_results: VecDeque<LogonResult>,
    /// Whether `disconnect` is confirmed with a `Disconnected` event.
    pub confirm_disconnect: bool,
    /// The `LoggedOff` result sent in answer to a logoff, if any.
    pub logoff_result: Option<EResult>,
    /// Drops the transport's event sender when a logon is sent.
    pub close_events_on_logon: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            connect_failures: 0,
            answer_logons: true,
            logon_results: VecDeque::new(),
            confirm_disconnect: true,
            logoff_result: Some(EResult::Ok),
            close_events_on_logon: false,
        }
    }
}

impl Script {
    pub fn rejecting(result: LogonResult) -> Self {
        Self {
            logon_results: VecDeque::from([result]),
            ..Self::default()
        }
    }

    pub fn failing_connects(connect_failures: u32) -> Self {
        Self {
            connect_failures,
            ..Self::default()
        }
    }
}

/// An in-memory transport that records every call and answers from a script.
pub struct MockTransport {
    events: Option<mpsc::Sender<TransportEvent>>,
    calls: Arc<Mutex<Vec<TransportCall>>>,
    script: Script,
    connect_calls: u32,
}

impl MockTransport {
    async fn emit(&self, event: TransportEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event).await;
        }
    }

    fn record(&self, call: TransportCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.record(TransportCall::Connect);
        self.connect_calls += 1;
        if self.connect_calls <= self.script.connect_failures {
            return Err(TransportError::Connect("connection refused".into()));
        }
        self.emit(TransportEvent::Connected).await;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.record(TransportCall::Disconnect);
        if self.script.confirm_disconnect {
            self.emit(TransportEvent::Disconnected {
                user_initiated: true,
            })
            .await;
        }
        Ok(())
    }

    async fn send_logon(&mut self, request: &LogonRequest) -> Result<(), TransportError> {
        self.record(TransportCall::Logon {
            username: request.username().to_string(),
            credential: request.credential().clone(),
            login_id: request.login_id(),
        });
        if self.script.close_events_on_logon {
            self.events = None;
            return Ok(());
        }
        if !self.script.answer_logons {
            return Ok(());
        }
        let result = self
            .script
            .logon_results
            .pop_front()
            .unwrap_or_else(LogonResult::ok);
        self.emit(TransportEvent::MessageReceived(ServerMessage::LogonResponse(result)))
            .await;
        Ok(())
    }

    async fn send_logoff(&mut self) -> Result<(), TransportError> {
        self.record(TransportCall::Logoff);
        if let Some(result) = self.script.logoff_result {
            self.emit(TransportEvent::MessageReceived(ServerMessage::LoggedOff { result }))
                .await;
        }
        Ok(())
    }
}

/// TestSession bundles a controller over a `MockTransport` with everything a
/// test needs to observe it.
pub struct TestSession {
    pub controller: SessionController<MockTransport>,
    pub calls: Arc<Mutex<Vec<TransportCall>>>,
    /// Injects events as if the transport emitted them. `None` when the
    /// script closes the event stream.
    pub events: Option<mpsc::Sender<TransportEvent>>,
    pub notifications: mpsc::UnboundedReceiver<Notification>,
}

impl TestSession {
    /// A session over the default configuration that logs on with an access
    /// token.
    pub fn new(script: Script) -> Self {
        Self::with_details(
            Config::default(),
            LogonDetails::with_access_token("alice", "access-token"),
            script,
        )
    }

    pub fn with_details(config: Config, details: LogonDetails, script: Script) -> Self {
        init_tracing();

        let (events_tx, events_rx) = event_channel();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let close_events = script.close_events_on_logon;
        let transport = MockTransport {
            events: Some(events_tx.clone()),
            calls: Arc::clone(&calls),
            script,
            connect_calls: 0,
        };
        let (sink, notifications) = ChannelSink::new();

        let controller = SessionController::new(
            &config,
            transport,
            events_rx,
            Box::new(StaticCredentials::new(details)),
            Arc::new(sink),
        );

        Self {
            controller,
            calls,
            events: (!close_events).then_some(events_tx),
            notifications,
        }
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().clone()
    }

    pub fn logon_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, TransportCall::Logon { .. }))
            .count()
    }

    pub fn connect_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, TransportCall::Connect))
            .count()
    }

    /// Drains every notification reported so far.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut drained = Vec::new();
        while let Ok(n) = self.notifications.try_recv() {
            drained.push(n);
        }
        drained
    }
}

/// Returns the `(from, to)` pairs of every reported state change.
pub fn transitions(
    notifications: &[Notification],
) -> Vec<(tether::ConnectionState, tether::ConnectionState)> {
    notifications
        .iter()
        .filter_map(|n| match n {
            Notification::StateChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect()
}
