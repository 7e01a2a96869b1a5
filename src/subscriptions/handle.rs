//! Disposable subscription handles.

use crate::types::{SubscriptionId, TypeKey};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;

use super::registry::Registry;

/// Token for removing exactly one subscription.
///
/// Dropping the handle does not unsubscribe; call [`dispose`](Self::dispose).
/// The handle only holds a weak reference, so it never keeps a bus alive and
/// disposing after the bus is gone is a silent no-op.
#[must_use = "dropping the handle leaves the subscription in place; keep it to dispose later"]
pub struct SubscriptionHandle<S> {
    id: SubscriptionId,
    declared: TypeKey,
    registry: Weak<Registry<S>>,
    disposed: AtomicBool,
}

impl<S> SubscriptionHandle<S> {
    pub(crate) fn new(id: SubscriptionId, declared: TypeKey, registry: Weak<Registry<S>>) -> Self {
        Self {
            id,
            declared,
            registry,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// The payload type this subscription was declared against.
    pub fn declared_type(&self) -> TypeKey {
        self.declared
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Remove the subscription. Only the first call has any effect.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.declared, self.id);
        }
    }
}

impl<S> fmt::Debug for SubscriptionHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("declared", &self.declared)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
