//! Error types for the event bus.

use crate::types::{SubscriptionId, TypeKey};
use std::fmt;
use thiserror::Error;

/// Boxed error returned by a failing handler.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for bus operations.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Event bus has been disposed")]
    Disposed,

    #[error("{0}")]
    HandlersFailed(HandlerFailures),

    #[error("Dispatch queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Failed to spawn dispatch worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

/// Why a single handler invocation failed.
#[derive(Debug)]
pub enum FailureCause {
    /// The handler returned an error.
    Error(BoxError),
    /// The handler panicked; holds the panic message when it was a string.
    Panic(String),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Error(e) => write!(f, "{}", e),
            FailureCause::Panic(msg) => write!(f, "panicked: {}", msg),
        }
    }
}

/// One handler that failed during a publish.
#[derive(Debug, Error)]
#[error("handler {subscription} for {declared} failed: {cause}")]
pub struct HandlerFailure {
    pub subscription: SubscriptionId,
    pub declared: TypeKey,
    pub cause: FailureCause,
}

impl HandlerFailure {
    /// True if the handler panicked rather than returning an error.
    pub fn is_panic(&self) -> bool {
        matches!(self.cause, FailureCause::Panic(_))
    }
}

/// Every failure collected from one dispatched batch, in invocation order.
#[derive(Debug)]
pub struct HandlerFailures {
    /// The published payload type.
    pub payload: TypeKey,
    pub failures: Vec<HandlerFailure>,
}

impl HandlerFailures {
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HandlerFailure> {
        self.failures.iter()
    }

    /// Ids of the failed subscriptions, in invocation order.
    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.failures.iter().map(|f| f.subscription).collect()
    }
}

impl fmt::Display for HandlerFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} handler(s) failed while dispatching {}",
            self.failures.len(),
            self.payload
        )?;
        for failure in &self.failures {
            write!(f, "; {}", failure)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a HandlerFailures {
    type Item = &'a HandlerFailure;
    type IntoIter = std::slice::Iter<'a, HandlerFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.failures.iter()
    }
}

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;
