//! Action handler registry
//!
//! Inbound frames are routed by action name to registered callbacks.
//! Several independent consumers can listen to the same action, each under
//! a caller-supplied id, so registration is an upsert: re-registering an
//! existing `(action, id)` pair replaces the callback in place instead of
//! adding a duplicate entry.
//!
//! Dispatch invokes every entry for the action in registration order. Each
//! callback runs isolated: a panicking handler is logged with its id and
//! the remaining handlers still receive the payload.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

/// Callback invoked with the frame payload for its action.
pub type HandlerFn = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

struct HandlerEntry {
    id: String,
    callback: HandlerFn,
}

/// Registry of action-keyed handler entries
///
/// Cheaply cloneable; clones share the same underlying table.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: Arc<Mutex<HashMap<String, Vec<HandlerEntry>>>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a handler for an action.
    ///
    /// If `id` is already registered anywhere in the registry under the same
    /// action, its callback is replaced in place and keeps its position in
    /// the dispatch order.
    pub fn upsert<F>(&self, action: impl Into<String>, id: impl Into<String>, callback: F)
    where
        F: Fn(serde_json::Value) + Send + Sync + 'static,
    {
        let action = action.into();
        let id = id.into();
        let callback: HandlerFn = Arc::new(callback);

        let mut handlers = self.handlers.lock().unwrap();
        let entries = handlers.entry(action).or_default();
        match entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => entry.callback = callback,
            None => entries.push(HandlerEntry { id, callback }),
        }
    }

    /// Remove the handler with the given id, wherever it is registered.
    /// No-op when the id is unknown.
    pub fn remove_by_id(&self, id: &str) {
        let mut handlers = self.handlers.lock().unwrap();
        for entries in handlers.values_mut() {
            entries.retain(|e| e.id != id);
        }
        handlers.retain(|_, entries| !entries.is_empty());
    }

    /// Remove every handler registered for an action. No-op when the action
    /// has no handlers.
    pub fn remove_by_action(&self, action: &str) {
        self.handlers.lock().unwrap().remove(action);
    }

    /// Remove all handlers.
    pub fn clear(&self) {
        self.handlers.lock().unwrap().clear();
    }

    /// True when a handler with this id exists for any action.
    pub fn has_handler(&self, id: &str) -> bool {
        self.handlers
            .lock()
            .unwrap()
            .values()
            .any(|entries| entries.iter().any(|e| e.id == id))
    }

    /// Total number of registered entries across all actions.
    pub fn handler_count(&self) -> usize {
        self.handlers
            .lock()
            .unwrap()
            .values()
            .map(|entries| entries.len())
            .sum()
    }

    /// Invoke every handler registered for `action` with the payload.
    ///
    /// The matching entries are snapshotted before invocation, so handlers
    /// may mutate the registry (including removing themselves) without
    /// deadlocking. Returns the number of handlers invoked.
    pub fn dispatch(&self, action: &str, payload: &serde_json::Value) -> usize {
        let snapshot: Vec<(String, HandlerFn)> = {
            let handlers = self.handlers.lock().unwrap();
            match handlers.get(action) {
                Some(entries) => entries
                    .iter()
                    .map(|e| (e.id.clone(), Arc::clone(&e.callback)))
                    .collect(),
                None => return 0,
            }
        };

        let invoked = snapshot.len();
        for (id, callback) in snapshot {
            let data = payload.clone();
            if catch_unwind(AssertUnwindSafe(|| callback(data))).is_err() {
                tracing::error!(action, handler_id = %id, "handler panicked during dispatch");
            }
        }
        invoked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_dispatch_invokes_registered_handler() {
        let registry = ActionRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        registry.upsert("privateMessage", "badge", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let invoked = registry.dispatch("privateMessage", &json!({"conversationId": "c1"}));
        assert_eq!(invoked, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let registry = ActionRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first);
        registry.upsert("notification", "badge", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&second);
        registry.upsert("notification", "badge", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(registry.handler_count(), 1);
        registry.dispatch("notification", &json!(null));

        // Only the replacement ran, and it ran exactly once.
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_multiple_ids_same_action() {
        let registry = ActionRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for id in ["menu", "list", "panel"] {
            let counter = Arc::clone(&calls);
            registry.upsert("privateMessage", id, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(registry.dispatch("privateMessage", &json!(null)), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_panicking_handler_does_not_suppress_others() {
        let registry = ActionRegistry::new();
        let delivered = Arc::new(AtomicUsize::new(0));

        registry.upsert("message", "broken", |_| {
            panic!("handler blew up");
        });
        let counter = Arc::clone(&delivered);
        registry.upsert("message", "working", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registry.dispatch("message", &json!({"personId": "p1"}));
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_by_id() {
        let registry = ActionRegistry::new();
        registry.upsert("a", "one", |_| {});
        registry.upsert("b", "two", |_| {});

        registry.remove_by_id("one");
        assert!(!registry.has_handler("one"));
        assert!(registry.has_handler("two"));

        // Removing an unknown id is a no-op
        registry.remove_by_id("missing");
        assert_eq!(registry.handler_count(), 1);
    }

    #[test]
    fn test_remove_by_action() {
        let registry = ActionRegistry::new();
        registry.upsert("a", "one", |_| {});
        registry.upsert("a", "two", |_| {});
        registry.upsert("b", "three", |_| {});

        registry.remove_by_action("a");
        assert_eq!(registry.handler_count(), 1);
        assert_eq!(registry.dispatch("a", &json!(null)), 0);
    }

    #[test]
    fn test_clear() {
        let registry = ActionRegistry::new();
        registry.upsert("a", "one", |_| {});
        registry.upsert("b", "two", |_| {});

        registry.clear();
        assert_eq!(registry.handler_count(), 0);
    }

    #[test]
    fn test_dispatch_unknown_action() {
        let registry = ActionRegistry::new();
        assert_eq!(registry.dispatch("nothing", &json!(null)), 0);
    }

    #[test]
    fn test_handler_may_remove_itself_during_dispatch() {
        let registry = ActionRegistry::new();
        let inner = registry.clone();
        registry.upsert("once", "self-removing", move |_| {
            inner.remove_by_id("self-removing");
        });

        assert_eq!(registry.dispatch("once", &json!(null)), 1);
        assert_eq!(registry.dispatch("once", &json!(null)), 0);
    }

    #[test]
    fn test_registration_order_preserved() {
        let registry = ActionRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for id in ["first", "second", "third"] {
            let log = Arc::clone(&order);
            registry.upsert("ordered", id, move |_| {
                log.lock().unwrap().push(id);
            });
        }

        registry.dispatch("ordered", &json!(null));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }
}
