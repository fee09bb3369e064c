// src/core/callbacks/mod.rs

//! The callback dispatcher: a typed publish/subscribe bus that routes
//! session callbacks to the handlers registered for their kind.
//!
//! Delivery is synchronous and happens on the task that calls `publish`.
//! The subscription table is the only shared state; it sits behind a mutex
//! so subscriptions can be created or closed from any thread, including from
//! inside a handler that is currently being invoked. `publish` takes a
//! snapshot of the handlers for the callback's kind and releases the lock
//! before invoking any of them.

use crate::core::enums::EResult;
use crate::core::errors::HandlerError;
use crate::core::metrics;
use crate::core::session::logon::LogonResult;
use crate::core::transport::{ServerMessage, TransportEvent};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use strum_macros::{Display, EnumDiscriminants, EnumIter};
use tracing::{debug, warn};

pub mod subscription;

pub use subscription::{Subscription, SubscriptionSet, Unsubscribe};

/// How long `Subscription::close` waits for the subscription table before
/// reporting a failure.
const CLOSE_LOCK_TIMEOUT: Duration = Duration::from_millis(250);

/// A callback produced by the session from a transport event.
#[derive(Debug, Clone, PartialEq, Eq, EnumDiscriminants)]
#[strum_discriminants(name(CallbackKind), derive(Hash, Display, EnumIter))]
pub enum Callback {
    /// The transport established a connection.
    Connected,
    /// The transport lost or closed its connection.
    Disconnected { user_initiated: bool },
    /// The service answered a logon request.
    LoggedOn(LogonResult),
    /// The service ended the logged-on session.
    LoggedOff { result: EResult },
}

impl Callback {
    pub fn kind(&self) -> CallbackKind {
        CallbackKind::from(self)
    }
}

impl From<TransportEvent> for Callback {
    fn from(event: TransportEvent) -> Self {
        match event {
            TransportEvent::Connected => Callback::Connected,
            TransportEvent::Disconnected { user_initiated } => {
                Callback::Disconnected { user_initiated }
            }
            TransportEvent::MessageReceived(ServerMessage::LogonResponse(result)) => {
                Callback::LoggedOn(result)
            }
            TransportEvent::MessageReceived(ServerMessage::LoggedOff { result }) => {
                Callback::LoggedOff { result }
            }
        }
    }
}

/// A registered handler. `C` is the context the publisher lends to handlers
/// for the duration of one delivery; the dispatcher never owns it.
pub type Handler<C> = Arc<dyn Fn(&mut C, &Callback) -> Result<(), HandlerError> + Send + Sync>;

struct Registration<C> {
    id: u64,
    active: Arc<AtomicBool>,
    handler: Handler<C>,
}

/// The shared subscription table.
struct SubscriptionTable<C> {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<CallbackKind, Vec<Registration<C>>>>,
}

/// Type-erased removal access used by `Subscription`, so handles do not carry
/// the dispatcher's context type.
pub(crate) trait Registry: Send + Sync {
    /// Removes a registration. Returns `Ok(false)` if it was not present.
    fn remove(&self, kind: CallbackKind, id: u64) -> Result<bool, String>;
}

impl<C: 'static> Registry for SubscriptionTable<C> {
    fn remove(&self, kind: CallbackKind, id: u64) -> Result<bool, String> {
        let Some(mut handlers) = self.handlers.try_lock_for(CLOSE_LOCK_TIMEOUT) else {
            return Err(format!(
                "subscription table still locked after {CLOSE_LOCK_TIMEOUT:?}"
            ));
        };

        let Some(registrations) = handlers.get_mut(&kind) else {
            return Ok(false);
        };
        let Some(position) = registrations.iter().position(|r| r.id == id) else {
            return Ok(false);
        };
        let removed = registrations.remove(position);
        if registrations.is_empty() {
            handlers.remove(&kind);
        }
        // The handler may own subscriptions whose drop needs this lock.
        drop(handlers);
        drop(removed);
        Ok(true)
    }
}

/// A handler failure captured during `publish`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub subscription_id: u64,
    pub kind: CallbackKind,
    pub error: HandlerError,
}

/// The outcome of delivering one callback.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Handlers that ran to completion without error.
    pub delivered: usize,
    /// Handlers that returned an error or panicked.
    pub failures: Vec<HandlerFailure>,
}

/// `CallbackManager` routes published callbacks to subscribed handlers.
pub struct CallbackManager<C> {
    table: Arc<SubscriptionTable<C>>,
}

impl<C> Clone for CallbackManager<C> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
        }
    }
}

impl<C: 'static> Default for CallbackManager<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static> CallbackManager<C> {
    pub fn new() -> Self {
        Self {
            table: Arc::new(SubscriptionTable {
                next_id: AtomicU64::new(1),
                handlers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Registers `handler` for every callback of `kind`. The handler stays
    /// registered until the returned `Subscription` is closed or dropped.
    pub fn subscribe<F>(&self, kind: CallbackKind, handler: F) -> Subscription
    where
        F: Fn(&mut C, &Callback) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let id = self.table.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));

        self.table
            .handlers
            .lock()
            .entry(kind)
            .or_default()
            .push(Registration {
                id,
                active: Arc::clone(&active),
                handler: Arc::new(handler),
            });

        debug!("Subscribed handler #{} to {} callbacks.", id, kind);

        let registry: Weak<dyn Registry> = Arc::downgrade(&self.table) as Weak<dyn Registry>;
        Subscription::new(id, kind, active, registry)
    }

    /// Delivers `callback` to every handler currently subscribed to its kind,
    /// in registration order.
    ///
    /// Errors and panics are caught per handler, logged and returned in the
    /// report; they never stop delivery to the remaining handlers.
    pub fn publish(&self, ctx: &mut C, callback: &Callback) -> DispatchReport {
        let kind = callback.kind();

        // Snapshot the handlers so that handlers may subscribe or close
        // subscriptions without deadlocking or invalidating the iteration.
        let snapshot: Vec<(u64, Arc<AtomicBool>, Handler<C>)> = self
            .table
            .handlers
            .lock()
            .get(&kind)
            .map(|registrations| {
                registrations
                    .iter()
                    .map(|r| (r.id, Arc::clone(&r.active), Arc::clone(&r.handler)))
                    .collect()
            })
            .unwrap_or_default();

        let mut report = DispatchReport::default();
        for (id, active, handler) in snapshot {
            // Closed by an earlier handler in this same delivery.
            if !active.load(Ordering::Acquire) {
                continue;
            }

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(ctx, callback)));
            let error = match outcome {
                Ok(Ok(())) => {
                    report.delivered += 1;
                    continue;
                }
                Ok(Err(e)) => e,
                Err(payload) => HandlerError::Panicked(panic_message(payload.as_ref())),
            };

            warn!("Callback handler #{} for {} failed: {}", id, kind, error);
            metrics::CALLBACK_HANDLER_FAILURES_TOTAL.inc();
            report.failures.push(HandlerFailure {
                subscription_id: id,
                kind,
                error,
            });
        }

        report
    }

    /// Returns the total number of open subscriptions across all kinds.
    pub fn subscriber_count(&self) -> usize {
        self.table.handlers.lock().values().map(Vec::len).sum()
    }

    /// Returns the number of open subscriptions for one kind.
    pub fn subscriber_count_for(&self, kind: CallbackKind) -> usize {
        self.table.handlers.lock().get(&kind).map_or(0, Vec::len)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
