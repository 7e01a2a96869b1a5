//! Subscription registry: declared type -> ordered bucket of subscriptions.

use crate::error::{BusError, Result};
use crate::hierarchy::Lineage;
use crate::types::{SubscriptionId, TypeKey};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use super::types::{ErasedHandler, HandlerIdentity, Subscription};

/// All subscriptions declared against one payload type, in subscribe order.
struct Bucket<S> {
    key: TypeKey,
    entries: Vec<Arc<Subscription<S>>>,
}

struct Inner<S> {
    /// Buckets in the order their declared type was first registered.
    /// Emptied buckets are kept so that order stays stable.
    buckets: Vec<Bucket<S>>,
    /// Declared type -> position in `buckets`.
    index: HashMap<TypeKey, usize>,
    /// Live subscription count across all buckets.
    live: usize,
    closed: bool,
}

impl<S> Inner<S> {
    fn bucket(&self, key: &TypeKey) -> Option<&Bucket<S>> {
        self.index.get(key).map(|&pos| &self.buckets[pos])
    }

    fn bucket_mut(&mut self, key: &TypeKey) -> Option<&mut Bucket<S>> {
        let pos = *self.index.get(key)?;
        Some(&mut self.buckets[pos])
    }

    fn remove_where<F>(&mut self, key: &TypeKey, pred: F) -> Option<Arc<Subscription<S>>>
    where
        F: Fn(&Subscription<S>) -> bool,
    {
        let bucket = self.bucket_mut(key)?;
        let pos = bucket.entries.iter().position(|sub| pred(&**sub))?;
        let removed = bucket.entries.remove(pos);
        self.live -= 1;
        Some(removed)
    }
}

/// Point-in-time copy of the subscriptions a publish must reach.
///
/// Detached from the registry: later subscribe/unsubscribe calls do not
/// affect a snapshot already taken.
pub(crate) struct Snapshot<S> {
    entries: Vec<Arc<Subscription<S>>>,
}

impl<S> Snapshot<S> {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Subscription<S>> {
        self.entries.iter().map(|sub| &**sub)
    }
}

/// Owns every live subscription of one bus.
pub(crate) struct Registry<S> {
    inner: RwLock<Inner<S>>,
    next_id: AtomicU64,
}

impl<S> Registry<S> {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                buckets: Vec::new(),
                index: HashMap::new(),
                live: 0,
                closed: false,
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `handler` under exactly `declared`.
    ///
    /// Returns the existing id if the same handler identity is already in
    /// that bucket.
    pub(crate) fn add(
        &self,
        declared: TypeKey,
        identity: HandlerIdentity,
        handler: ErasedHandler<S>,
    ) -> Result<SubscriptionId> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(BusError::Disposed);
        }

        if let Some(existing) = inner
            .bucket(&declared)
            .and_then(|b| b.entries.iter().find(|sub| sub.identity == identity))
        {
            trace!(declared = %declared, id = %existing.id, "Handler already subscribed");
            return Ok(existing.id);
        }

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let subscription = Arc::new(Subscription {
            id,
            declared,
            identity,
            handler,
        });

        let existing_pos = inner.index.get(&declared).copied();
        let pos = match existing_pos {
            Some(pos) => pos,
            None => {
                let pos = inner.buckets.len();
                inner.buckets.push(Bucket {
                    key: declared,
                    entries: Vec::new(),
                });
                inner.index.insert(declared, pos);
                pos
            }
        };
        inner.buckets[pos].entries.push(subscription);
        inner.live += 1;

        debug!(declared = %declared, id = %id, "Subscribed");
        Ok(id)
    }

    /// Remove subscription `id` from the bucket keyed exactly by `declared`.
    pub(crate) fn remove(&self, declared: &TypeKey, id: SubscriptionId) -> bool {
        let removed = self.inner.write().remove_where(declared, |sub| sub.id == id);
        self.finish_remove(removed)
    }

    /// Remove the subscription with handler `identity` from exactly `declared`.
    pub(crate) fn remove_handler(&self, declared: &TypeKey, identity: HandlerIdentity) -> bool {
        let removed = self
            .inner
            .write()
            .remove_where(declared, |sub| sub.identity == identity);
        self.finish_remove(removed)
    }

    // The removed subscription is dropped here, after the write lock is
    // released, so a handler whose drop re-enters the bus cannot deadlock.
    fn finish_remove(&self, removed: Option<Arc<Subscription<S>>>) -> bool {
        match removed {
            Some(sub) => {
                debug!(declared = %sub.declared, id = %sub.id, "Unsubscribed");
                true
            }
            None => false,
        }
    }

    /// Copy every subscription whose declared type is in `lineage`.
    ///
    /// Buckets appear in first-registration order, entries in subscribe order.
    pub(crate) fn snapshot(&self, lineage: &Lineage) -> Result<Snapshot<S>> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(BusError::Disposed);
        }

        let entries: Vec<_> = inner
            .buckets
            .iter()
            .filter(|bucket| lineage.contains(&bucket.key))
            .flat_map(|bucket| bucket.entries.iter().cloned())
            .collect();

        trace!(
            payload = %lineage.payload_type(),
            matched = entries.len(),
            "Snapshot taken"
        );
        Ok(Snapshot { entries })
    }

    /// True if any type in `lineage` has a live subscription.
    pub(crate) fn has(&self, lineage: &Lineage) -> bool {
        let inner = self.inner.read();
        lineage
            .iter()
            .filter_map(|key| inner.bucket(key))
            .any(|bucket| !bucket.entries.is_empty())
    }

    /// Drop every subscription.
    pub(crate) fn clear(&self) {
        let drained = {
            let mut inner = self.inner.write();
            inner.index.clear();
            inner.live = 0;
            std::mem::take(&mut inner.buckets)
        };
        if !drained.is_empty() {
            debug!(buckets = drained.len(), "Registry cleared");
        }
    }

    /// Clear and reject all further adds and snapshots.
    pub(crate) fn close(&self) {
        self.inner.write().closed = true;
        self.clear();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.inner.read().closed
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.read().live
    }
}
