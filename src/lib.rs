// src/lib.rs

pub mod config;
pub mod core;

// Re-export
pub use crate::config::Config;
pub use crate::core::session::logon::{LogonDetails, StaticCredentials};
pub use crate::core::session::notify::{ChannelSink, Notification, StatusSink, TracingSink};
pub use crate::core::{ConnectionState, DisconnectReason, SessionController, SessionHandle};
