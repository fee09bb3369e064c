// src/core/errors.rs

//! Defines the error taxonomy shared by the dispatcher, the session controller
//! and the token decoder.

use crate::core::callbacks::CallbackKind;
use crate::core::enums::EResult;
use crate::core::session::ConnectionState;
use crate::core::session::logon::LogonResult;
use thiserror::Error;

/// Errors returned by `SessionController::run` itself. Terminal session
/// outcomes (authentication rejection, reconnect give-up) are not errors: they
/// are reported through the returned `ConnectionState`.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid transport configuration: {0}")]
    InvalidTransportConfig(String),

    #[error("Session controller is not idle (current state: {0})")]
    NotIdle(ConnectionState),
}

/// Failures raised by the transport client while connecting, disconnecting or
/// sending session messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Failed to disconnect: {0}")]
    Disconnect(String),

    #[error("Failed to send message: {0}")]
    Send(String),

    #[error("Transport event stream closed")]
    EventStreamClosed,
}

/// A logon attempt that the service answered with a non-success code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Logon rejected: {0}")]
pub struct AuthenticationError(pub LogonResult);

impl AuthenticationError {
    pub fn result(&self) -> EResult {
        self.0.result
    }
}

/// Diagnostic token decoding failures. Never fatal to the controller.
#[derive(Error, Debug)]
pub enum MalformedTokenError {
    #[error("Token must have exactly 3 dot-delimited segments, found {0}")]
    SegmentCount(usize),

    #[error("Token payload is not valid base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Token payload is not well-formed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Token payload is not a JSON object")]
    NotAnObject,
}

/// A failure while releasing a callback subscription.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Couldn't close subscription #{id} for {kind}: {reason}")]
pub struct SubscriptionCloseError {
    pub id: u64,
    pub kind: CallbackKind,
    pub reason: String,
}

/// An error returned by a callback handler. Isolated per handler by the dispatcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),

    #[error("Handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn msg(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}
