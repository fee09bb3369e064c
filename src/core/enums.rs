// src/core/enums.rs

//! Result codes reported by the remote service.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, FromRepr};

/// The service-wide result taxonomy. Only the codes a session controller can
/// actually observe during logon and logoff are listed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr, Serialize, Deserialize,
)]
#[repr(i32)]
pub enum EResult {
    Invalid = 0,
    Ok = 1,
    Fail = 2,
    NoConnection = 3,
    InvalidPassword = 5,
    LoggedInElsewhere = 6,
    InvalidParam = 8,
    Busy = 10,
    InvalidState = 11,
    AccessDenied = 15,
    Timeout = 16,
    Banned = 17,
    AccountNotFound = 18,
    ServiceUnavailable = 20,
    NotLoggedOn = 21,
    Expired = 27,
    TryAnotherCM = 48,
    AccountLogonDenied = 63,
    InvalidLoginAuthCode = 65,
    RateLimitExceeded = 84,
    AccountLoginDeniedNeedTwoFactor = 85,
    TwoFactorCodeMismatch = 88,
}

impl EResult {
    /// Maps a raw wire code to a known result. Unknown codes yield `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::from_repr(code)
    }

    /// The raw wire code.
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        self == EResult::Ok
    }
}
