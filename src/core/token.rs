// src/core/token.rs

//! Decodes the claims of a dot-delimited, base64url-encoded token (JWT
//! layout) for diagnostics. Signatures are never checked and the decoder
//! holds no state.

use crate::core::errors::MalformedTokenError;
use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// URL-safe base64 that accepts both padded and unpadded input.
const URL_SAFE_ANY_PAD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// The header written by `encode_unsigned`.
const UNSIGNED_HEADER: &str = r#"{"alg":"none","typ":"JWT"}"#;

/// The claims object carried in a token's payload segment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TokenClaims(Map<String, Value>);

impl TokenClaims {
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// The `sub` claim, usually the account id the token was issued for.
    pub fn subject(&self) -> Option<&str> {
        self.get("sub").and_then(Value::as_str)
    }

    pub fn issuer(&self) -> Option<&str> {
        self.get("iss").and_then(Value::as_str)
    }

    /// The `aud` claim, which may be a single string or an array of strings.
    pub fn audience(&self) -> Vec<&str> {
        match self.get("aud") {
            Some(Value::String(aud)) => vec![aud.as_str()],
            Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp("exp")
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp("iat")
    }

    /// True if the token carries an `exp` claim at or before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_default()
    }

    fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        let seconds = self.get(key)?.as_i64()?;
        DateTime::<Utc>::from_timestamp(seconds, 0)
    }
}

impl From<Map<String, Value>> for TokenClaims {
    fn from(claims: Map<String, Value>) -> Self {
        Self(claims)
    }
}

/// Decodes the payload segment of `token`.
///
/// The token must have exactly three `.`-delimited segments. The middle
/// segment may use the URL-safe or the standard alphabet, with or without
/// padding, and must decode to a JSON object.
pub fn decode(token: &str) -> Result<TokenClaims, MalformedTokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(MalformedTokenError::SegmentCount(segments.len()));
    };

    let normalized = payload.replace('+', "-").replace('/', "_");
    let bytes = URL_SAFE_ANY_PAD.decode(normalized.as_bytes())?;

    match serde_json::from_slice::<Value>(&bytes)? {
        Value::Object(claims) => Ok(TokenClaims(claims)),
        _ => Err(MalformedTokenError::NotAnObject),
    }
}

/// Builds an unsigned three-segment token carrying `claims`. The signature
/// segment is empty.
pub fn encode_unsigned(claims: &TokenClaims) -> Result<String, MalformedTokenError> {
    let payload = serde_json::to_vec(&claims.0)?;
    Ok(format!(
        "{}.{}.",
        URL_SAFE_NO_PAD.encode(UNSIGNED_HEADER),
        URL_SAFE_NO_PAD.encode(payload)
    ))
}
