//! The concurrent key→[`Value`] store and its observer registry.
//!
//! `Memory` is the single source of truth: a lock-guarded map plus a list of
//! weakly-held observers notified of every committed change. Keys are never
//! removed once inserted; a key's value may change variant across writes.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use tokio::sync::RwLock;

use crate::value::Value;

/// A sink for memory change notifications.
///
/// `diff` is always non-empty: the minimal set of keys that were inserted or
/// whose value actually changed in one [`Memory::write`] (or, for the
/// initial delivery on [`Memory::add_observer`], the full current contents).
#[async_trait::async_trait]
pub trait Observer: Send + Sync {
    async fn memory_modified(&self, diff: &BTreeMap<String, Value>);
}

struct Inner {
    entries: BTreeMap<String, Value>,
    observers: Vec<Weak<dyn Observer>>,
}

/// Thread-safe keyed value store with change notification.
///
/// All operations are total: there is no failure mode for `Read`/`Write`/
/// `AddObserver`. A single lock serializes them; observer callbacks run
/// after the lock is released, so an observer that re-enters `Memory` (e.g.
/// a `Controller`'s own `Set`) cannot deadlock against the writer that
/// triggered it.
pub struct Memory {
    inner: RwLock<Inner>,
}

impl Memory {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: BTreeMap::new(),
                observers: Vec::new(),
            }),
        }
    }

    /// Returns a consistent snapshot of exactly the requested keys that
    /// exist. Missing keys are silently omitted.
    pub async fn read(&self, keys: &[String]) -> BTreeMap<String, Value> {
        let inner = self.inner.read().await;
        keys.iter()
            .filter_map(|k| inner.entries.get(k).map(|v| (k.clone(), v.clone())))
            .collect()
    }

    /// Inserts absent keys and replaces present keys whose value actually
    /// differs (structural inequality). Keys whose written value equals the
    /// stored value produce neither a modification nor a notification.
    pub async fn write(&self, keyvalues: BTreeMap<String, Value>) {
        let (modifications, observers) = {
            let mut inner = self.inner.write().await;
            let mut modifications = BTreeMap::new();
            for (key, value) in keyvalues {
                let changed = match inner.entries.get(&key) {
                    Some(existing) => existing != &value,
                    None => true,
                };
                if changed {
                    inner.entries.insert(key.clone(), value.clone());
                    modifications.insert(key, value);
                }
            }
            if modifications.is_empty() {
                return;
            }
            tracing::debug!(changed_keys = modifications.len(), "memory write committed");
            (modifications, inner.observers.clone())
        };

        self.notify(&modifications, &observers).await;
    }

    /// Registers an observer (held weakly) and, iff `Memory` is non-empty,
    /// immediately delivers a synthetic diff containing the full current
    /// contents to that observer alone — before any subsequent incremental
    /// diff reaches it.
    pub async fn add_observer(&self, observer: Weak<dyn Observer>) {
        let initial = {
            let mut inner = self.inner.write().await;
            inner.observers.push(observer.clone());
            if inner.entries.is_empty() {
                None
            } else {
                Some(inner.entries.clone())
            }
        };

        if let Some(snapshot) = initial {
            if let Some(obs) = observer.upgrade() {
                obs.memory_modified(&snapshot).await;
            }
        }
    }

    async fn notify(&self, diff: &BTreeMap<String, Value>, observers: &[Weak<dyn Observer>]) {
        let mut dead = false;
        for weak in observers {
            match weak.upgrade() {
                Some(obs) => obs.memory_modified(diff).await,
                None => dead = true,
            }
        }
        if dead {
            let mut inner = self.inner.write().await;
            inner.observers.retain(|o| o.strong_count() > 0);
        }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct RecordingObserver {
        calls: StdMutex<Vec<BTreeMap<String, Value>>>,
    }

    impl RecordingObserver {
        fn new() -> Self {
            Self {
                calls: StdMutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<BTreeMap<String, Value>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Observer for RecordingObserver {
        async fn memory_modified(&self, diff: &BTreeMap<String, Value>) {
            self.calls.lock().unwrap().push(diff.clone());
        }
    }

    fn map(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn read_omits_missing_keys() {
        let memory = Memory::new();
        memory.write(map(&[("a", Value::Int(1))])).await;

        let out = memory
            .read(&["a".to_string(), "missing".to_string()])
            .await;
        assert_eq!(out, map(&[("a", Value::Int(1))]));
    }

    #[tokio::test]
    async fn noop_write_suppresses_notification() {
        let memory = Memory::new();
        memory.write(map(&[("k", Value::Bool(true))])).await;

        let observer: Arc<RecordingObserver> = Arc::new(RecordingObserver::new());
        memory.add_observer(Arc::downgrade(&observer) as Weak<dyn Observer>).await;
        assert_eq!(observer.calls().len(), 1); // initial snapshot

        memory.write(map(&[("k", Value::Bool(true))])).await;
        assert_eq!(observer.calls().len(), 1, "no-op write must not notify");
    }

    #[tokio::test]
    async fn initial_observer_snapshot_then_incremental_diffs() {
        let memory = Memory::new();
        memory
            .write(map(&[("a", Value::Int(1)), ("b", Value::Str("x".into()))]))
            .await;

        let observer: Arc<RecordingObserver> = Arc::new(RecordingObserver::new());
        memory.add_observer(Arc::downgrade(&observer) as Weak<dyn Observer>).await;

        let calls = observer.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0],
            map(&[("a", Value::Int(1)), ("b", Value::Str("x".into()))])
        );

        memory.write(map(&[("a", Value::Int(2))])).await;
        let calls = observer.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], map(&[("a", Value::Int(2))]));
    }

    #[tokio::test]
    async fn add_observer_on_empty_memory_sends_nothing() {
        let memory = Memory::new();
        let observer: Arc<RecordingObserver> = Arc::new(RecordingObserver::new());
        memory.add_observer(Arc::downgrade(&observer) as Weak<dyn Observer>).await;
        assert!(observer.calls().is_empty());
    }

    #[tokio::test]
    async fn dropped_observer_is_tolerated() {
        let memory = Memory::new();
        {
            let observer: Arc<RecordingObserver> = Arc::new(RecordingObserver::new());
            memory.add_observer(Arc::downgrade(&observer) as Weak<dyn Observer>).await;
        }
        // observer dropped; a subsequent write must not panic or deadlock.
        memory.write(map(&[("a", Value::Int(1))])).await;
    }

    #[tokio::test]
    async fn insert_vs_replace_diff_contents() {
        let memory = Memory::new();
        memory.write(map(&[("a", Value::Int(1))])).await;
        memory
            .write(map(&[("a", Value::Int(1)), ("b", Value::Int(2))]))
            .await;

        let out = memory.read(&["a".to_string(), "b".to_string()]).await;
        assert_eq!(out, map(&[("a", Value::Int(1)), ("b", Value::Int(2))]));
    }
}
