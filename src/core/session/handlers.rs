// src/core/session/handlers.rs

//! The controller's own callback handlers. They are registered ahead of any
//! owner subscription, so owner handlers always observe the updated state.

use super::context::{Action, SessionContext};
use super::notify::Notification;
use super::state::{ConnectionState, DisconnectReason};
use crate::core::callbacks::Callback;
use crate::core::errors::{AuthenticationError, HandlerError};
use crate::core::metrics;
use tracing::{debug, warn};

type HandlerResult = Result<(), HandlerError>;

/// The transport finished connecting: submit the logon.
pub(crate) fn on_connected(ctx: &mut SessionContext, callback: &Callback) -> HandlerResult {
    let Callback::Connected = callback else {
        return Ok(());
    };

    if ctx.state != ConnectionState::Connecting {
        debug!("Ignoring connected event in state {}.", ctx.state);
        return Ok(());
    }

    ctx.transition(ConnectionState::Connected);
    ctx.notify(Notification::Connected);

    // `stop` already queued the disconnect; logging on now would only waste
    // the credential.
    if ctx.stop_requested {
        return Ok(());
    }

    let default_login_id = ctx.default_login_id;
    match ctx
        .credentials
        .next_request()
        .map(|request| request.or_login_id(default_login_id))
    {
        Some(request) => {
            ctx.notify(Notification::LoggingOn {
                username: request.username().to_string(),
                login_id: request.login_id(),
            });
            ctx.transition(ConnectionState::LoggingOn);
            ctx.logon_outstanding = true;
            ctx.actions.push_back(Action::Logon(request));
        }
        None => {
            ctx.notify(Notification::CredentialsExhausted);
            ctx.terminate(DisconnectReason::CredentialsExhausted);
            ctx.actions.push_back(Action::Disconnect);
        }
    }
    Ok(())
}

/// The transport lost or closed the connection.
pub(crate) fn on_disconnected(ctx: &mut SessionContext, callback: &Callback) -> HandlerResult {
    let Callback::Disconnected { user_initiated } = callback else {
        return Ok(());
    };
    ctx.connection_lost(*user_initiated);
    Ok(())
}

/// The service answered the logon request.
pub(crate) fn on_logged_on(ctx: &mut SessionContext, callback: &Callback) -> HandlerResult {
    let Callback::LoggedOn(result) = callback else {
        return Ok(());
    };

    if ctx.state != ConnectionState::LoggingOn {
        warn!("Unexpected logon response ({}) in state {}.", result, ctx.state);
        return Ok(());
    }

    ctx.logon_outstanding = false;
    metrics::LOGONS_TOTAL
        .with_label_values(&[result.result.to_string().as_str()])
        .inc();

    if result.is_success() {
        ctx.transition(ConnectionState::LoggedOn);
        ctx.policy.reset(&mut ctx.retry);
        ctx.notify(Notification::LogonSucceeded);
        return Ok(());
    }

    // The credential was consumed whatever the reason; never retry.
    ctx.notify(Notification::LogonRejected(AuthenticationError(*result)));
    ctx.terminate(DisconnectReason::AuthenticationRejected(*result));
    ctx.actions.push_back(Action::Disconnect);
    Ok(())
}

/// The service ended the logged-on session.
pub(crate) fn on_logged_off(ctx: &mut SessionContext, callback: &Callback) -> HandlerResult {
    let Callback::LoggedOff { result } = callback else {
        return Ok(());
    };

    match ctx.state {
        ConnectionState::LoggingOff => {
            ctx.notify(Notification::LoggedOff(*result));
            ctx.begin_stop();
        }
        ConnectionState::LoggedOn => {
            ctx.notify(Notification::LoggedOff(*result));
            ctx.terminate(DisconnectReason::LoggedOff(*result));
            ctx.actions.push_back(Action::Disconnect);
        }
        state => debug!("Ignoring logged off event in state {}.", state),
    }
    Ok(())
}
