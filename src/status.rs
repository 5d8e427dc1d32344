//! Registry for operator-visible component status messages.
//!
//! Any component (a collector, a sink, the heartbeat writer) can publish a
//! short status string keyed by `(monitor_id, component)`; the most recent
//! call wins. Overwriting is the whole point — stale entries aren't kept
//! around waiting to be proven wrong.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Key identifying one status slot.
pub type StatusKey = (String, String);

/// Registry of the latest status message per `(monitor_id, component)`.
#[derive(Default, Clone, Debug)]
pub struct StatusRegistry {
    inner: Arc<Mutex<BTreeMap<StatusKey, String>>>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or overwrite) the status message for a component.
    pub fn set(&self, monitor_id: impl Into<String>, component: impl Into<String>, message: impl Into<String>) {
        let key = (monitor_id.into(), component.into());
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).insert(key, message.into());
    }

    /// Clear the status message for a component, e.g. once it recovers.
    pub fn remove(&self, monitor_id: &str, component: &str) {
        let key = (monitor_id.to_string(), component.to_string());
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).remove(&key);
    }

    /// Current status message for a single component, if any.
    pub fn get(&self, monitor_id: &str, component: &str) -> Option<String> {
        let key = (monitor_id.to_string(), component.to_string());
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).get(&key).cloned()
    }

    /// Sorted snapshot of every status currently registered.
    pub fn snapshot(&self) -> BTreeMap<StatusKey, String> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove_roundtrip() {
        let registry = StatusRegistry::new();
        registry.set("m1", "heartbeat", "ok");
        assert_eq!(registry.get("m1", "heartbeat").as_deref(), Some("ok"));
        registry.remove("m1", "heartbeat");
        assert_eq!(registry.get("m1", "heartbeat"), None);
    }

    #[test]
    fn overwrite_replaces_prior_value() {
        let registry = StatusRegistry::new();
        registry.set("m1", "sink:prometheus", "sending");
        registry.set("m1", "sink:prometheus", "stalled: connection refused");
        assert_eq!(
            registry.get("m1", "sink:prometheus").as_deref(),
            Some("stalled: connection refused")
        );
    }

    #[test]
    fn snapshot_is_sorted_and_scoped_per_monitor() {
        let registry = StatusRegistry::new();
        registry.set("m2", "heartbeat", "ok");
        registry.set("m1", "heartbeat", "ok");
        registry.set("m1", "sink:jsonl", "ok");
        let snapshot = registry.snapshot();
        let keys: Vec<_> = snapshot.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                ("m1".to_string(), "heartbeat".to_string()),
                ("m1".to_string(), "sink:jsonl".to_string()),
                ("m2".to_string(), "heartbeat".to_string()),
            ]
        );
    }
}
