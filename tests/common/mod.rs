//! Payload hierarchy shared by the integration tests.
//!
//! ```text
//! Event
//! ├── Started
//! ├── Stopped
//! └── Message
//!     ├── FriendMessage
//!     └── GroupMessage
//! ```

#![allow(dead_code)]

use std::sync::Arc;
use parking_lot::Mutex;
use typed_event_bus::Payload;

#[derive(Clone, Debug, Default)]
pub struct Event;

impl Payload for Event {
    type Parent = Event;
    fn parent(&self) -> &Event {
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct Started {
    pub base: Event,
}

impl Payload for Started {
    type Parent = Event;
    fn parent(&self) -> &Event {
        &self.base
    }
}

#[derive(Clone, Debug, Default)]
pub struct Stopped {
    pub base: Event,
}

impl Payload for Stopped {
    type Parent = Event;
    fn parent(&self) -> &Event {
        &self.base
    }
}

#[derive(Clone, Debug)]
pub struct Message {
    pub base: Event,
    pub kind: String,
    pub text: String,
}

impl Message {
    pub fn new(kind: &str, text: &str) -> Self {
        Self {
            base: Event,
            kind: kind.to_string(),
            text: text.to_string(),
        }
    }
}

impl Payload for Message {
    type Parent = Event;
    fn parent(&self) -> &Event {
        &self.base
    }
}

#[derive(Clone, Debug)]
pub struct FriendMessage {
    pub message: Message,
}

impl FriendMessage {
    pub fn new(text: &str) -> Self {
        Self {
            message: Message::new("friend", text),
        }
    }
}

impl Payload for FriendMessage {
    type Parent = Message;
    fn parent(&self) -> &Message {
        &self.message
    }
}

#[derive(Clone, Debug)]
pub struct GroupMessage {
    pub message: Message,
}

impl GroupMessage {
    pub fn new(text: &str) -> Self {
        Self {
            message: Message::new("group", text),
        }
    }
}

impl Payload for GroupMessage {
    type Parent = Message;
    fn parent(&self) -> &Message {
        &self.message
    }
}

pub fn started() -> Started {
    Started { base: Event }
}

pub fn stopped() -> Stopped {
    Stopped { base: Event }
}

/// Shared, ordered log of handler invocations.
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}
