//! # Typed Event Bus
//!
//! An in-process, strongly-typed publish/subscribe bus. Publishers and
//! subscribers only share payload types; neither knows about the other.
//!
//! ## Core Concepts
//!
//! - **Payloads**: Types implementing [`Payload`], arranged in a static,
//!   single-rooted hierarchy
//! - **Subscriptions**: A handler registered against one declared payload type;
//!   it also receives every descendant of that type
//! - **Handles**: Idempotent tokens for removing one subscription
//! - **Dispatch**: Snapshot-based, isolates failing handlers and reports them
//!   together
//!
//! ## Example
//!
//! ```ignore
//! use typed_event_bus::{EventBus, Payload};
//!
//! struct Event;
//! impl Payload for Event {
//!     type Parent = Event;
//!     fn parent(&self) -> &Event { self }
//! }
//!
//! struct Started { base: Event }
//! impl Payload for Started {
//!     type Parent = Event;
//!     fn parent(&self) -> &Event { &self.base }
//! }
//!
//! let bus: EventBus<&'static str> = EventBus::new();
//!
//! // Receives Started as well
//! let handle = bus.subscribe(|sender, _: &Event| println!("event from {}", sender))?;
//!
//! bus.publish(&"client", Started { base: Event })?;
//!
//! handle.dispose();
//! ```

pub mod bus;
pub mod dispatch;
pub mod error;
pub mod hierarchy;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use bus::{BusConfig, EventBus, Subscriptions};
pub use dispatch::{DispatchMode, DEFAULT_QUEUE_CAPACITY};
pub use error::{BoxError, BusError, FailureCause, HandlerFailure, HandlerFailures, Result};
pub use hierarchy::{lineage, Lineage, Payload};
pub use subscriptions::{Handler, HandlerResult, IntoHandlerResult, SubscriptionHandle};
pub use types::{SubscriptionId, TypeKey};
