// src/core/session/logon.rs

//! Logon requests, results and the credentials behind them.

use crate::core::enums::EResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A secret string whose `Debug` and `Display` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret value. Callers must not log it.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// The proof of identity presented with a logon request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// A single-use web logon nonce. The service consumes it on first use.
    WebLogonNonce(Secret),
    /// A long-lived access token that may be presented on every reconnect.
    AccessToken(Secret),
}

impl Credential {
    pub fn is_single_use(&self) -> bool {
        matches!(self, Credential::WebLogonNonce(_))
    }
}

/// Caller-supplied logon parameters.
#[derive(Debug, Clone)]
pub struct LogonDetails {
    pub username: String,
    pub credential: Credential,
    /// Correlation id. Set it to a non-zero value only when another session
    /// for the same account runs from the same private and public address.
    pub login_id: u32,
}

impl LogonDetails {
    pub fn with_nonce(username: impl Into<String>, nonce: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            credential: Credential::WebLogonNonce(Secret::new(nonce)),
            login_id: 0,
        }
    }

    pub fn with_access_token(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            credential: Credential::AccessToken(Secret::new(token)),
            login_id: 0,
        }
    }

    pub fn login_id(mut self, login_id: u32) -> Self {
        self.login_id = login_id;
        self
    }
}

/// An immutable logon request handed to the transport exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct LogonRequest {
    username: String,
    credential: Credential,
    login_id: u32,
}

impl LogonRequest {
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn login_id(&self) -> u32 {
        self.login_id
    }

    /// Uses `login_id` unless the request already carries a non-zero id.
    pub(crate) fn or_login_id(mut self, login_id: u32) -> Self {
        if self.login_id == 0 {
            self.login_id = login_id;
        }
        self
    }
}

impl From<LogonDetails> for LogonRequest {
    fn from(details: LogonDetails) -> Self {
        Self {
            username: details.username,
            credential: details.credential,
            login_id: details.login_id,
        }
    }
}

/// The service's answer to one logon request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogonResult {
    pub result: EResult,
    pub extended_result: Option<EResult>,
}

impl LogonResult {
    pub fn ok() -> Self {
        Self {
            result: EResult::Ok,
            extended_result: None,
        }
    }

    pub fn failed(result: EResult, extended_result: Option<EResult>) -> Self {
        Self {
            result,
            extended_result,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

impl fmt::Display for LogonResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.extended_result {
            Some(extended) => write!(f, "{} / {}", self.result, extended),
            None => write!(f, "{}", self.result),
        }
    }
}

/// Supplies the logon request for each connection attempt.
pub trait CredentialSource: Send {
    /// Returns the request for the next logon, or `None` when no usable
    /// credential remains.
    fn next_request(&mut self) -> Option<LogonRequest>;
}

/// A credential source backed by fixed logon details. A nonce is handed out
/// once; an access token is handed out on every call.
#[derive(Debug)]
pub struct StaticCredentials {
    details: Option<LogonDetails>,
}

impl StaticCredentials {
    pub fn new(details: LogonDetails) -> Self {
        Self {
            details: Some(details),
        }
    }
}

impl CredentialSource for StaticCredentials {
    fn next_request(&mut self) -> Option<LogonRequest> {
        let details = self.details.as_ref()?;
        if details.credential.is_single_use() {
            return self.details.take().map(LogonRequest::from);
        }
        Some(LogonRequest::from(details.clone()))
    }
}
