//! The event bus facade tying the registry and dispatch together.

use crate::dispatch::engine;
use crate::dispatch::queue::DispatchQueue;
use crate::dispatch::DispatchMode;
use crate::error::{BusError, Result};
use crate::hierarchy::{self, Payload};
use crate::subscriptions::{Handler, IntoHandlerResult, Registry, SubscriptionHandle};
use crate::types::{SubscriptionId, TypeKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Bus configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Where handlers run.
    /// Default: synchronous
    pub dispatch: DispatchMode,

    /// Thread name of the queued-mode worker.
    pub worker_name: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchMode::Synchronous,
            worker_name: "event-bus-dispatch".to_string(),
        }
    }
}

/// Queued-mode worker plus the means to give each job its own sender.
struct Queued<S> {
    queue: DispatchQueue,
    own_sender: fn(&S) -> S,
}

struct Shared<S> {
    registry: Arc<Registry<S>>,
    queued: Option<Queued<S>>,
    mode: DispatchMode,
    disposed: AtomicBool,
}

/// In-process publish/subscribe bus for payloads sent by `S`.
///
/// Handlers are registered against a declared payload type and receive every
/// published payload whose lineage contains that type. Clones share the same
/// registry and lifecycle.
///
/// The bus is not tied to a single root type: payloads from unrelated
/// hierarchies may share one bus, and a handler only ever sees payloads
/// whose lineage contains its declared type.
///
/// A handler that captures a clone of its own bus keeps the bus alive until
/// that subscription is removed or the bus is disposed.
pub struct EventBus<S> {
    shared: Arc<Shared<S>>,
}

impl<S> EventBus<S>
where
    S: Send + Sync + 'static,
{
    /// Create a synchronous bus.
    pub fn new() -> Self {
        Self::from_parts(None, DispatchMode::Synchronous)
    }

    fn from_parts(queued: Option<Queued<S>>, mode: DispatchMode) -> Self {
        let mode = match (&queued, mode) {
            (Some(queued), DispatchMode::Queued { .. }) => DispatchMode::Queued {
                capacity: queued.queue.capacity(),
            },
            (_, mode) => mode,
        };
        Self {
            shared: Arc::new(Shared {
                registry: Arc::new(Registry::new()),
                queued,
                mode,
                disposed: AtomicBool::new(false),
            }),
        }
    }

    // --- Subscribing ---

    /// Subscribe a closure to payloads of type `T` and its descendants.
    ///
    /// Every call creates a new subscription. Use [`subscribe_handler`]
    /// with a shared [`Handler`] to get duplicate suppression and handler
    /// based [`unsubscribe`].
    ///
    /// [`subscribe_handler`]: Self::subscribe_handler
    /// [`unsubscribe`]: Self::unsubscribe
    pub fn subscribe<T, F, R>(&self, f: F) -> Result<SubscriptionHandle<S>>
    where
        T: Payload,
        F: Fn(&S, &T) -> R + Send + Sync + 'static,
        R: IntoHandlerResult,
    {
        self.subscribe_handler(&Handler::new(f))
    }

    /// Subscribe `handler` to payloads of type `T` and its descendants.
    ///
    /// If the same handler is already subscribed to exactly `T`, the returned
    /// handle refers to the existing subscription.
    pub fn subscribe_handler<T: Payload>(
        &self,
        handler: &Handler<S, T>,
    ) -> Result<SubscriptionHandle<S>> {
        let declared = TypeKey::of::<T>();
        let id = self
            .shared
            .registry
            .add(declared, handler.identity(), handler.erase())?;
        Ok(SubscriptionHandle::new(
            id,
            declared,
            Arc::downgrade(&self.shared.registry),
        ))
    }

    /// Remove `handler` from exactly `T`. Returns false if it was not there.
    pub fn unsubscribe<T: Payload>(&self, handler: &Handler<S, T>) -> bool {
        self.shared
            .registry
            .remove_handler(&TypeKey::of::<T>(), handler.identity())
    }

    /// Remove subscription `id` declared against `declared`.
    pub fn unsubscribe_id(&self, declared: TypeKey, id: SubscriptionId) -> bool {
        self.shared.registry.remove(&declared, id)
    }

    /// True if a handler for `T` or any of its ancestors is subscribed.
    pub fn is_subscribed<T: Payload>(&self) -> bool {
        self.shared.registry.has(&hierarchy::lineage::<T>())
    }

    /// Number of live subscriptions across all declared types.
    pub fn subscription_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// A subscribe-only view of this bus.
    pub fn subscriptions(&self) -> Subscriptions<S> {
        Subscriptions { bus: self.clone() }
    }

    // --- Publishing ---

    /// Publish `payload` to every handler declared against its type or an
    /// ancestor.
    ///
    /// Handlers run in the order their declared types were first subscribed,
    /// and within one type in subscribe order. In synchronous mode every
    /// failing handler is reported in [`BusError::HandlersFailed`] after the
    /// whole batch ran. In queued mode the batch is enqueued and failures are
    /// only logged.
    pub fn publish<T: Payload>(&self, sender: &S, payload: T) -> Result<()> {
        let lineage = hierarchy::lineage::<T>();
        let snapshot = self.shared.registry.snapshot(&lineage)?;
        trace!(payload = %lineage.payload_type(), handlers = snapshot.len(), "Publishing");

        match &self.shared.queued {
            None => engine::dispatch(&snapshot, sender, &payload).map_err(BusError::HandlersFailed),
            Some(queued) => {
                if snapshot.is_empty() {
                    return Ok(());
                }
                let sender = (queued.own_sender)(sender);
                queued.queue.enqueue(Box::new(move || {
                    // Failures were already logged per handler.
                    let _ = engine::dispatch(&snapshot, &sender, &payload);
                }))
            }
        }
    }

    /// Wait until every batch queued so far has been dispatched.
    ///
    /// No-op in synchronous mode and when called from a handler.
    pub fn flush(&self) {
        if let Some(queued) = &self.shared.queued {
            queued.queue.flush();
        }
    }

    // --- Lifecycle ---

    /// Remove every subscription and make the bus inert.
    ///
    /// Afterwards `publish` and `subscribe` fail with [`BusError::Disposed`],
    /// `is_subscribed` is false for every type and unsubscribing is a no-op.
    /// Queued batches that have not started are discarded. Idempotent.
    pub fn dispose(&self) {
        self.shared.registry.close();
        if let Some(queued) = &self.shared.queued {
            queued.queue.shutdown();
        }
        if !self.shared.disposed.swap(true, Ordering::SeqCst) {
            debug!("Event bus disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.registry.is_closed()
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        self.shared.mode
    }
}

impl<S> EventBus<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Create a bus from configuration.
    ///
    /// Queued batches carry their own copy of the sender, hence the `Clone`
    /// bound. Fails only if the queued-mode worker thread cannot be spawned.
    pub fn with_config(config: BusConfig) -> Result<Self> {
        let queued = match config.dispatch {
            DispatchMode::Synchronous => None,
            DispatchMode::Queued { capacity } => Some(Queued {
                queue: DispatchQueue::start(capacity, &config.worker_name)?,
                own_sender: S::clone,
            }),
        };
        Ok(Self::from_parts(queued, config.dispatch))
    }
}

impl<S> Default for EventBus<S>
where
    S: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for EventBus<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> fmt::Debug for EventBus<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("mode", &self.shared.mode)
            .field("subscriptions", &self.shared.registry.len())
            .field("disposed", &self.shared.registry.is_closed())
            .finish()
    }
}

/// Subscribe-only view of an [`EventBus`].
///
/// Lets an owner hand out the ability to listen while keeping publishing
/// and disposal to itself.
pub struct Subscriptions<S> {
    bus: EventBus<S>,
}

impl<S> Subscriptions<S>
where
    S: Send + Sync + 'static,
{
    pub fn subscribe<T, F, R>(&self, f: F) -> Result<SubscriptionHandle<S>>
    where
        T: Payload,
        F: Fn(&S, &T) -> R + Send + Sync + 'static,
        R: IntoHandlerResult,
    {
        self.bus.subscribe(f)
    }

    pub fn subscribe_handler<T: Payload>(
        &self,
        handler: &Handler<S, T>,
    ) -> Result<SubscriptionHandle<S>> {
        self.bus.subscribe_handler(handler)
    }

    pub fn unsubscribe<T: Payload>(&self, handler: &Handler<S, T>) -> bool {
        self.bus.unsubscribe(handler)
    }

    pub fn is_subscribed<T: Payload>(&self) -> bool {
        self.bus.is_subscribed::<T>()
    }
}

impl<S> Clone for Subscriptions<S> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
        }
    }
}

impl<S> fmt::Debug for Subscriptions<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriptions")
            .field("bus", &self.bus)
            .finish()
    }
}
