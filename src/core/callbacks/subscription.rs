// src/core/callbacks/subscription.rs

//! Subscription handles and the owned set that releases them on every exit path.

use super::{CallbackKind, Registry};
use crate::core::errors::SubscriptionCloseError;
use crate::core::metrics;
use std::fmt;
use std::sync::Weak;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Something that can be released from a dispatcher.
pub trait Unsubscribe: Send {
    /// Releases the registration. Calling it again after success is a no-op.
    fn close(&self) -> Result<(), SubscriptionCloseError>;

    /// Gives up on a registration whose close failed, so that dropping the
    /// handle does not try again.
    fn abandon(&self) {}
}

/// An opaque handle binding one callback kind to one handler.
///
/// Dropping the handle closes it.
pub struct Subscription {
    id: u64,
    kind: CallbackKind,
    active: Arc<AtomicBool>,
    registry: Weak<dyn Registry>,
}

impl Subscription {
    pub(crate) fn new(
        id: u64,
        kind: CallbackKind,
        active: Arc<AtomicBool>,
        registry: Weak<dyn Registry>,
    ) -> Self {
        Self {
            id,
            kind,
            active,
            registry,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> CallbackKind {
        self.kind
    }

    /// True until the subscription has been closed successfully.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Unregisters the handler. Closing an already-closed subscription, or one
    /// whose dispatcher no longer exists, is a no-op.
    pub fn close(&self) -> Result<(), SubscriptionCloseError> {
        if !self.is_active() {
            return Ok(());
        }

        let Some(registry) = self.registry.upgrade() else {
            self.active.store(false, Ordering::Release);
            return Ok(());
        };

        match registry.remove(self.kind, self.id) {
            Ok(removed) => {
                self.active.store(false, Ordering::Release);
                if removed {
                    debug!("Closed subscription #{} for {}.", self.id, self.kind);
                }
                Ok(())
            }
            Err(reason) => Err(SubscriptionCloseError {
                id: self.id,
                kind: self.kind,
                reason,
            }),
        }
    }
}

impl Unsubscribe for Subscription {
    fn close(&self) -> Result<(), SubscriptionCloseError> {
        Subscription::close(self)
    }

    fn abandon(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("{}", e);
        }
    }
}

/// An owned collection of subscriptions, released together.
///
/// `close_all` closes every entry exactly once, continuing past failures. An
/// entry whose close failed is abandoned rather than retried on drop; its
/// registration may remain in the dispatcher and the failure is returned.
/// Dropping the set closes whatever is still held, so no registration leaks
/// when the owner exits through an error path.
#[derive(Default)]
pub struct SubscriptionSet {
    entries: Vec<Box<dyn Unsubscribe>>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, subscription: impl Unsubscribe + 'static) {
        self.entries.push(Box::new(subscription));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Closes and releases every held subscription. Returns the failures;
    /// the set is empty afterwards either way.
    pub fn close_all(&mut self) -> Vec<SubscriptionCloseError> {
        if self.entries.is_empty() {
            return Vec::new();
        }

        debug!("Closing {} subscriptions.", self.entries.len());
        let mut failures = Vec::new();
        for entry in self.entries.drain(..) {
            if let Err(e) = entry.close() {
                entry.abandon();
                warn!("{}", e);
                metrics::SUBSCRIPTION_CLOSE_FAILURES_TOTAL.inc();
                failures.push(e);
            }
        }
        failures
    }
}

impl Drop for SubscriptionSet {
    fn drop(&mut self) {
        self.close_all();
    }
}
