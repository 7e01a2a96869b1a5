//! Handler and subscription types.

use crate::error::BoxError;
use crate::hierarchy::Payload;
use crate::types::{SubscriptionId, TypeKey};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Outcome of a single handler invocation.
pub type HandlerResult = std::result::Result<(), BoxError>;

/// Conversion for handler return values.
///
/// Lets handlers return either `()` or any `Result<(), E>` whose error
/// converts into a [`BoxError`].
pub trait IntoHandlerResult {
    fn into_handler_result(self) -> HandlerResult;
}

impl IntoHandlerResult for () {
    fn into_handler_result(self) -> HandlerResult {
        Ok(())
    }
}

impl<E> IntoHandlerResult for std::result::Result<(), E>
where
    E: Into<BoxError>,
{
    fn into_handler_result(self) -> HandlerResult {
        self.map_err(Into::into)
    }
}

type HandlerFn<S, T> = dyn Fn(&S, &T) -> HandlerResult + Send + Sync;

/// A shareable handler for payloads of type `T` sent by `S`.
///
/// Clones share identity: subscribing the same `Handler` (or a clone) twice
/// to one declared type registers it once, and [`crate::EventBus::unsubscribe`]
/// finds it again by that identity.
pub struct Handler<S, T> {
    f: Arc<HandlerFn<S, T>>,
}

impl<S, T> Handler<S, T>
where
    S: 'static,
    T: Payload,
{
    pub fn new<F, R>(f: F) -> Self
    where
        F: Fn(&S, &T) -> R + Send + Sync + 'static,
        R: IntoHandlerResult,
    {
        Handler {
            f: Arc::new(move |sender: &S, payload: &T| f(sender, payload).into_handler_result()),
        }
    }

    /// Invoke the handler directly.
    pub fn call(&self, sender: &S, payload: &T) -> HandlerResult {
        (self.f)(sender, payload)
    }

    // A registered subscription holds a clone, so the address cannot be
    // reused while it is live.
    pub(crate) fn identity(&self) -> HandlerIdentity {
        HandlerIdentity(Arc::as_ptr(&self.f) as *const () as usize)
    }

    /// Type-erase into the form stored in the registry.
    pub(crate) fn erase(&self) -> ErasedHandler<S> {
        let f = Arc::clone(&self.f);
        Arc::new(move |sender: &S, payload: &dyn Any| match payload.downcast_ref::<T>() {
            Some(payload) => f(sender, payload),
            None => Err(format!(
                "payload is not a {}",
                std::any::type_name::<T>()
            )
            .into()),
        })
    }
}

impl<S, T> Clone for Handler<S, T> {
    fn clone(&self) -> Self {
        Handler {
            f: Arc::clone(&self.f),
        }
    }
}

impl<S, T> fmt::Debug for Handler<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("payload", &std::any::type_name::<T>())
            .finish()
    }
}

/// Identity of a handler allocation, used for deduplication.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct HandlerIdentity(usize);

pub(crate) type ErasedHandler<S> = Arc<dyn Fn(&S, &dyn Any) -> HandlerResult + Send + Sync>;

/// A live registration. Immutable once created.
pub(crate) struct Subscription<S> {
    pub(crate) id: SubscriptionId,
    pub(crate) declared: TypeKey,
    pub(crate) identity: HandlerIdentity,
    pub(crate) handler: ErasedHandler<S>,
}

impl<S> Subscription<S> {
    pub(crate) fn invoke(&self, sender: &S, payload: &dyn Any) -> HandlerResult {
        (self.handler)(sender, payload)
    }
}

impl<S> fmt::Debug for Subscription<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("declared", &self.declared)
            .finish()
    }
}
