// src/core/transport.rs

//! The contract between the session controller and the transport client that
//! owns the actual connection (framing, encryption, proxy tunnelling).
//!
//! The controller drives the transport through the `Transport` trait and
//! consumes the `TransportEvent`s it emits on an mpsc channel.

use crate::core::enums::EResult;
use crate::core::errors::{SessionError, TransportError};
use crate::core::session::logon::{LogonRequest, LogonResult};
use async_trait::async_trait;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// The capacity of the transport event channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

bitflags! {
    /// The connection protocols a transport may use.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProtocolTypes: u8 {
        /// Stream-oriented TCP.
        const TCP = 0b001;
        /// Datagram-based UDP.
        const UDP = 0b010;
        /// Message-oriented WebSocket.
        const WEB_SOCKET = 0b100;
    }
}

impl Default for ProtocolTypes {
    fn default() -> Self {
        ProtocolTypes::TCP
    }
}

/// A single protocol name as written in configuration files.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    Tcp,
    Udp,
    #[serde(alias = "web_socket")]
    WebSocket,
}

impl From<ProtocolKind> for ProtocolTypes {
    fn from(kind: ProtocolKind) -> Self {
        match kind {
            ProtocolKind::Tcp => ProtocolTypes::TCP,
            ProtocolKind::Udp => ProtocolTypes::UDP,
            ProtocolKind::WebSocket => ProtocolTypes::WEB_SOCKET,
        }
    }
}

impl FromIterator<ProtocolKind> for ProtocolTypes {
    fn from_iter<I: IntoIterator<Item = ProtocolKind>>(iter: I) -> Self {
        iter.into_iter()
            .fold(ProtocolTypes::empty(), |acc, kind| acc | kind.into())
    }
}

/// The kind of proxy the transport tunnels through.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    Socks,
    Http,
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyKind::Socks => f.write_str("SOCKS"),
            ProxyKind::Http => f.write_str("HTTP"),
        }
    }
}

/// An optional proxy endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub kind: ProxyKind,
}

/// Construction-time transport settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportConfig {
    pub protocols: ProtocolTypes,
    pub proxy: Option<ProxyConfig>,
}

impl TransportConfig {
    /// Rejects settings the transport could only fail on at connect time.
    /// An HTTP proxy can only carry message-oriented (WebSocket) connections.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.protocols.is_empty() {
            return Err(SessionError::InvalidTransportConfig(
                "at least one protocol must be enabled".into(),
            ));
        }

        if let Some(proxy) = &self.proxy {
            if proxy.host.trim().is_empty() {
                return Err(SessionError::InvalidTransportConfig(
                    "proxy host cannot be empty".into(),
                ));
            }
            if proxy.port == 0 {
                return Err(SessionError::InvalidTransportConfig(
                    "proxy port cannot be 0".into(),
                ));
            }
            if proxy.kind == ProxyKind::Http && self.protocols != ProtocolTypes::WEB_SOCKET {
                return Err(SessionError::InvalidTransportConfig(format!(
                    "an HTTP proxy only supports WebSocket connections, but {:?} is enabled",
                    self.protocols
                )));
            }
        }

        Ok(())
    }
}

/// A decoded message from the service that the session cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// The answer to our logon request.
    LogonResponse(LogonResult),
    /// The service ended the session.
    LoggedOff { result: EResult },
}

/// An event emitted by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected { user_initiated: bool },
    MessageReceived(ServerMessage),
}

/// Creates the channel a transport uses to hand events to the controller.
pub fn event_channel() -> (mpsc::Sender<TransportEvent>, mpsc::Receiver<TransportEvent>) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}

/// The transport client consumed by the session controller.
///
/// `connect` must be a no-op while a connection is already being established
/// or is established. Outcomes of `connect`/`disconnect` are reported as
/// `TransportEvent`s; the returned `Result` only covers failures to start
/// the operation.
#[async_trait]
pub trait Transport: Send {
    async fn connect(&mut self) -> Result<(), TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;

    async fn send_logon(&mut self, request: &LogonRequest) -> Result<(), TransportError>;

    async fn send_logoff(&mut self) -> Result<(), TransportError>;
}
