//! Subscription bookkeeping for the event bus.
//!
//! This module provides:
//! - [`Handler`]: a shareable, identity-carrying callback for one payload type
//! - The registry mapping each declared payload type to its ordered bucket
//! - [`SubscriptionHandle`]: an idempotent, disposable removal token
//!
//! Registry mutation takes a short write lock; dispatch works on detached
//! snapshots so handlers never run while the registry is locked.

mod handle;
pub(crate) mod registry;
mod types;

pub use handle::SubscriptionHandle;
pub(crate) use registry::{Registry, Snapshot};
pub(crate) use types::Subscription;
pub use types::{Handler, HandlerResult, IntoHandlerResult};
