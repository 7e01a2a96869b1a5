//! Synchronous batch dispatch with per-handler isolation.

use crate::error::{FailureCause, HandlerFailure, HandlerFailures};
use crate::hierarchy::{self, Payload};
use crate::subscriptions::{Snapshot, Subscription};
use crate::types::TypeKey;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{trace, warn};

/// Invoke every subscription in `snapshot` exactly once, in snapshot order.
///
/// A handler that returns an error or panics does not stop the batch; every
/// failure is collected and returned once the whole batch has run.
pub(crate) fn dispatch<S, T: Payload>(
    snapshot: &Snapshot<S>,
    sender: &S,
    payload: &T,
) -> std::result::Result<(), HandlerFailures> {
    let payload_type = TypeKey::of::<T>();
    if snapshot.is_empty() {
        trace!(payload = %payload_type, "No subscribers");
        return Ok(());
    }

    let views = hierarchy::views(payload);
    let mut failures = Vec::new();

    for sub in snapshot.iter() {
        let view = match views.iter().find(|(key, _)| *key == sub.declared) {
            Some((_, view)) => *view,
            None => continue,
        };

        if let Err(cause) = invoke(sub, sender, view) {
            warn!(
                payload = %payload_type,
                declared = %sub.declared,
                subscription = %sub.id,
                error = %cause,
                "Handler failed"
            );
            failures.push(HandlerFailure {
                subscription: sub.id,
                declared: sub.declared,
                cause,
            });
        }
    }

    trace!(
        payload = %payload_type,
        invoked = snapshot.len(),
        failed = failures.len(),
        "Batch dispatched"
    );

    if failures.is_empty() {
        Ok(())
    } else {
        Err(HandlerFailures {
            payload: payload_type,
            failures,
        })
    }
}

fn invoke<S>(
    sub: &Subscription<S>,
    sender: &S,
    view: &dyn Any,
) -> std::result::Result<(), FailureCause> {
    match panic::catch_unwind(AssertUnwindSafe(|| sub.invoke(sender, view))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(FailureCause::Error(e)),
        Err(panic) => Err(FailureCause::Panic(panic_message(&*panic))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::lineage;
    use crate::subscriptions::{Handler, Registry};
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Base;
    impl Payload for Base {
        type Parent = Base;
        fn parent(&self) -> &Base {
            self
        }
    }

    struct Child {
        base: Base,
        n: u32,
    }
    impl Payload for Child {
        type Parent = Base;
        fn parent(&self) -> &Base {
            &self.base
        }
    }

    fn add<T: Payload>(registry: &Registry<&'static str>, h: &Handler<&'static str, T>) {
        registry
            .add(TypeKey::of::<T>(), h.identity(), h.erase())
            .unwrap();
    }

    #[test]
    fn test_dispatch_in_snapshot_order() {
        let registry = Registry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = Arc::clone(&log);
        add(&registry, &Handler::new(move |_, _: &Base| l.lock().push("base")));
        let l = Arc::clone(&log);
        add(
            &registry,
            &Handler::new(move |sender: &&str, c: &Child| {
                l.lock().push(*sender);
                assert_eq!(c.n, 7);
            }),
        );

        let snapshot = registry.snapshot(&lineage::<Child>()).unwrap();
        dispatch(&snapshot, &"bot", &Child { base: Base, n: 7 }).unwrap();

        assert_eq!(*log.lock(), vec!["base", "bot"]);
    }

    #[test]
    fn test_failures_are_isolated_and_aggregated() {
        let registry = Registry::new();
        let ran = Arc::new(Mutex::new(0));

        add(
            &registry,
            &Handler::new(|_, _: &Base| -> Result<(), String> { Err("first".to_string()) }),
        );
        add(&registry, &Handler::new(|_, _: &Base| -> () { panic!("second") }));
        let r = Arc::clone(&ran);
        add(&registry, &Handler::new(move |_, _: &Base| *r.lock() += 1));

        let snapshot = registry.snapshot(&lineage::<Base>()).unwrap();
        let failures = dispatch(&snapshot, &"bot", &Base).unwrap_err();

        assert_eq!(*ran.lock(), 1);
        assert_eq!(failures.len(), 2);
        assert!(!failures.failures[0].is_panic());
        assert!(failures.failures[1].is_panic());
        assert_eq!(failures.failures[1].cause.to_string(), "panicked: second");
    }

    #[test]
    fn test_empty_snapshot_is_ok() {
        let registry: Registry<&'static str> = Registry::new();
        let snapshot = registry.snapshot(&lineage::<Base>()).unwrap();
        assert!(dispatch(&snapshot, &"bot", &Base).is_ok());
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&"owned".to_string()), "owned");
        assert_eq!(panic_message(&42u8), "non-string panic payload");
    }
}
