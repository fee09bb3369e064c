// src/core/mod.rs

//! The central module containing the session logic and data structures of Tether.

pub mod callbacks;
pub mod enums;
pub mod errors;
pub mod metrics;
pub mod reconnect;
pub mod session;
pub mod token;
pub mod transport;

pub use callbacks::{Callback, CallbackKind, CallbackManager};
pub use enums::EResult;
pub use errors::SessionError;
pub use session::{ConnectionState, DisconnectReason, SessionController, SessionHandle};
