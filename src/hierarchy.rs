//! Static payload type hierarchy.
//!
//! Every payload type names its parent through [`Payload::Parent`]; a root
//! names itself. The chain from a type up to its root is its *lineage*, and a
//! handler declared against any type in that lineage receives the payload.
//!
//! ```ignore
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
//! assert_eq!(lineage::<Started>().len(), 2);
//! ```

use crate::types::TypeKey;
use std::any::{Any, TypeId};

/// A type that can be published on the bus.
///
/// Implementations embed their parent's value (composition) so a handler
/// declared against the parent can be given a real `&Parent`.
pub trait Payload: Any + Send + Sync {
    /// Direct ancestor. Root types use `Self`.
    type Parent: Payload;

    /// This payload viewed as its parent. Roots return `self`.
    fn parent(&self) -> &Self::Parent;
}

fn is_root<T: Payload>() -> bool {
    TypeId::of::<T::Parent>() == TypeId::of::<T>()
}

/// Ordered set of declared types a payload satisfies, nearest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lineage {
    keys: Vec<TypeKey>,
}

impl Lineage {
    /// The concrete payload type.
    pub fn payload_type(&self) -> TypeKey {
        self.keys[0]
    }

    /// The topmost ancestor.
    pub fn root(&self) -> TypeKey {
        self.keys[self.keys.len() - 1]
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false: a lineage holds at least the type itself.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TypeKey> {
        self.keys.iter()
    }
}

impl<'a> IntoIterator for &'a Lineage {
    type Item = &'a TypeKey;
    type IntoIter = std::slice::Iter<'a, TypeKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}

/// Every declared type `T` is-a: itself, then each ancestor up to the root.
pub fn lineage<T: Payload>() -> Lineage {
    let mut keys = vec![TypeKey::of::<T>()];
    collect_ancestors::<T>(&mut keys);
    Lineage { keys }
}

fn collect_ancestors<T: Payload>(keys: &mut Vec<TypeKey>) {
    if is_root::<T>() {
        return;
    }
    let parent = TypeKey::of::<T::Parent>();
    // A cyclic declaration stops at the first repeat.
    if keys.contains(&parent) {
        return;
    }
    keys.push(parent);
    collect_ancestors::<T::Parent>(keys);
}

/// The payload projected onto each lineage entry, in lineage order.
pub(crate) fn views<T: Payload>(payload: &T) -> Vec<(TypeKey, &dyn Any)> {
    let mut out: Vec<(TypeKey, &dyn Any)> = vec![(TypeKey::of::<T>(), payload as &dyn Any)];
    collect_views(payload, &mut out);
    out
}

fn collect_views<'a, T: Payload>(payload: &'a T, out: &mut Vec<(TypeKey, &'a dyn Any)>) {
    if is_root::<T>() {
        return;
    }
    let key = TypeKey::of::<T::Parent>();
    if out.iter().any(|(k, _)| *k == key) {
        return;
    }
    let parent = payload.parent();
    out.push((key, parent as &dyn Any));
    collect_views(parent, out);
}
