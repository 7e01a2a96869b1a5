//! Publish-time dispatch.
//!
//! [`engine`] runs a snapshotted batch on the calling thread. [`queue`] moves
//! the same work onto a single worker thread for [`DispatchMode::Queued`].

pub(crate) mod engine;
pub(crate) mod queue;

use serde::{Deserialize, Serialize};

/// Default number of batches a queued bus buffers before rejecting publishes.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Where handlers run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DispatchMode {
    /// Handlers run on the publisher's thread before `publish` returns.
    Synchronous,
    /// `publish` enqueues the batch for a single worker thread and returns.
    Queued {
        #[serde(default = "default_capacity")]
        capacity: usize,
    },
}

fn default_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl DispatchMode {
    /// Queued mode with the default capacity.
    pub fn queued() -> Self {
        DispatchMode::Queued {
            capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl Default for DispatchMode {
    fn default() -> Self {
        DispatchMode::Synchronous
    }
}
