//! Listener registry keyed by event.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::models::EventKind;

/// Callback invoked with the event payload.
pub type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handle returned by registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered callbacks per event.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<(ListenerId, Callback)>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: EventKind, callback: Callback) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.entry(kind).or_default().push((id, callback));
        id
    }

    /// Remove one callback. Returns false if it was not registered under `kind`.
    pub fn remove(&mut self, kind: EventKind, id: ListenerId) -> bool {
        let Some(callbacks) = self.listeners.get_mut(&kind) else {
            return false;
        };
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        let removed = callbacks.len() != before;
        if callbacks.is_empty() {
            self.listeners.remove(&kind);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    /// Callbacks for `kind` in registration order.
    ///
    /// Returned as owned handles so callers can invoke them without holding
    /// the registry lock.
    pub fn snapshot(&self, kind: EventKind) -> Vec<Callback> {
        self.listeners
            .get(&kind)
            .map(|callbacks| callbacks.iter().map(|(_, cb)| cb.clone()).collect())
            .unwrap_or_default()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.values().all(Vec::is_empty)
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self
            .listeners
            .iter()
            .map(|(kind, callbacks)| (kind.as_str(), callbacks.len()))
            .collect();
        f.debug_struct("ListenerRegistry")
            .field("listeners", &counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &str) -> Callback {
        let log = log.clone();
        let tag = tag.to_string();
        Arc::new(move |payload: &Value| {
            log.lock().unwrap().push(format!("{}:{}", tag, payload));
        })
    }

    #[test]
    fn test_callbacks_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        registry.add(EventKind::Notification, recorder(&log, "first"));
        registry.add(EventKind::Notification, recorder(&log, "second"));
        registry.add(EventKind::FollowUpdate, recorder(&log, "other"));

        for cb in registry.snapshot(EventKind::Notification) {
            cb(&json!(1));
        }

        assert_eq!(*log.lock().unwrap(), vec!["first:1", "second:1"]);
    }

    #[test]
    fn test_remove_only_targets_one_callback() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        let a = registry.add(EventKind::CommentUpdate, recorder(&log, "a"));
        registry.add(EventKind::CommentUpdate, recorder(&log, "b"));

        assert!(!registry.remove(EventKind::Notification, a));
        assert!(registry.remove(EventKind::CommentUpdate, a));
        assert!(!registry.remove(EventKind::CommentUpdate, a));
        assert_eq!(registry.count(EventKind::CommentUpdate), 1);
    }

    #[test]
    fn test_clear() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        registry.add(EventKind::Connected, recorder(&log, "c"));
        registry.add(EventKind::Error, recorder(&log, "e"));

        registry.clear();

        assert!(registry.is_empty());
        assert!(registry.snapshot(EventKind::Connected).is_empty());
    }

    #[test]
    fn test_ids_are_unique_across_events() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        let a = registry.add(EventKind::Connected, recorder(&log, "a"));
        let b = registry.add(EventKind::Disconnected, recorder(&log, "b"));
        assert_ne!(a, b);
    }
}
