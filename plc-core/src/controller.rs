//! The wait engine: a [`Controller`] attaches to a [`Memory`] as an observer,
//! queues the diffs it receives, and exposes a family of blocking (async)
//! wait predicates plus heartbeat-driven connection liveness.
//!
//! Waits are driven by `tokio::select!` over a `Notify` and a timer, polling
//! in bounded slices so timeouts and heartbeat disconnects stay responsive
//! without blocking a whole OS thread per waiter.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{Mutex, Notify, RwLock};
use tokio::time::Instant;

use crate::memory::{Memory, Observer};
use crate::value::Value;

const POLL_SLICE: Duration = Duration::from_millis(50);

struct ControllerObserver {
    controller: Weak<Controller>,
}

#[async_trait::async_trait]
impl Observer for ControllerObserver {
    async fn memory_modified(&self, diff: &BTreeMap<String, Value>) {
        if let Some(controller) = self.controller.upgrade() {
            controller.enqueue(diff.clone()).await;
        }
    }
}

/// Attaches to a [`Memory`] and maintains a locally-integrated snapshot plus
/// a queue of not-yet-integrated diffs, with heartbeat-based liveness.
pub struct Controller {
    memory: Arc<Memory>,
    // Kept strongly so the `Memory`'s weak registration doesn't expire while
    // this `Controller` is alive; `Memory` holds only a `Weak` back to us,
    // so the two never form an ownership cycle.
    _observer: Arc<ControllerObserver>,
    heartbeat_interval: Option<Duration>,
    heartbeat_key: Option<String>,
    last_heartbeat: RwLock<Instant>,
    state: RwLock<BTreeMap<String, Value>>,
    queue: Mutex<VecDeque<BTreeMap<String, Value>>>,
    notify: Notify,
}

impl Controller {
    /// `heartbeat_interval = None` disables heartbeat tracking entirely
    /// (`IsConnected` is then always true). `heartbeat_key = None` means any
    /// modification counts as a heartbeat; `Some(key)` restricts it to
    /// writes touching that key.
    pub async fn new(
        memory: Arc<Memory>,
        heartbeat_interval: Option<Duration>,
        heartbeat_key: Option<String>,
    ) -> Arc<Self> {
        let controller = Arc::new_cyclic(|weak_self| {
            let observer = Arc::new(ControllerObserver {
                controller: weak_self.clone(),
            });
            Controller {
                memory: memory.clone(),
                _observer: observer,
                heartbeat_interval,
                heartbeat_key,
                last_heartbeat: RwLock::new(Instant::now()),
                state: RwLock::new(BTreeMap::new()),
                queue: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
            }
        });

        let weak_observer: Weak<dyn Observer> = Arc::downgrade(&controller._observer);
        memory.add_observer(weak_observer).await;
        controller
    }

    async fn enqueue(&self, diff: BTreeMap<String, Value>) {
        if self.heartbeat_interval.is_some() {
            let counts = match &self.heartbeat_key {
                None => true,
                Some(key) => diff.contains_key(key),
            };
            if counts {
                *self.last_heartbeat.write().await = Instant::now();
            }
        }

        self.queue.lock().await.push_back(diff);
        self.notify.notify_waiters();
    }

    /// True if heartbeat is disabled, or the last qualifying write arrived
    /// within `maxHeartbeatInterval`.
    pub async fn is_connected(&self) -> bool {
        match self.heartbeat_interval {
            None => true,
            Some(interval) => self.last_heartbeat.read().await.elapsed() < interval,
        }
    }

    /// Drains the entire queue into `state`, later diffs overwriting earlier
    /// ones per key. Non-blocking.
    pub async fn sync(&self) {
        let mut queue = self.queue.lock().await;
        if queue.is_empty() {
            return;
        }
        let mut state = self.state.write().await;
        while let Some(diff) = queue.pop_front() {
            state.extend(diff);
        }
    }

    /// The single low-level blocking primitive: waits for at least one diff,
    /// applies it to `state`, and returns it. `timeout = None` waits
    /// indefinitely. If `timeout_on_disconnect` and the connection drops
    /// mid-wait, returns `(empty, false)` promptly.
    pub async fn dequeue(
        &self,
        timeout: Option<Duration>,
        timeout_on_disconnect: bool,
    ) -> (BTreeMap<String, Value>, bool) {
        let deadline = timeout.map(|t| Instant::now() + t);
        match self.dequeue_until(deadline, timeout_on_disconnect).await {
            Some(diff) => (diff, true),
            None => (BTreeMap::new(), false),
        }
    }

    async fn dequeue_until(
        &self,
        deadline: Option<Instant>,
        timeout_on_disconnect: bool,
    ) -> Option<BTreeMap<String, Value>> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);

            {
                let mut queue = self.queue.lock().await;
                if let Some(diff) = queue.pop_front() {
                    drop(queue);
                    let mut state = self.state.write().await;
                    state.extend(diff.clone());
                    return Some(diff);
                }
            }

            if timeout_on_disconnect && !self.is_connected().await {
                return None;
            }
            if let Some(d) = deadline {
                if Instant::now() >= d {
                    return None;
                }
            }

            let wait_for = match deadline {
                Some(d) => std::cmp::min(d.saturating_duration_since(Instant::now()), POLL_SLICE),
                None => POLL_SLICE,
            };

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(wait_for) => {}
            }
        }
    }

    /// Loops dequeuing (without disconnect short-circuit) until connected,
    /// decrementing the budget by wall-time consumed.
    pub async fn wait_until_connected(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if self.is_connected().await {
                return true;
            }
            if self.dequeue_until(deadline, false).await.is_none() {
                return false;
            }
        }
    }

    /// Edge-triggered: returns on the first dequeued diff whose entry for
    /// `key` equals `value` (or, if `value` is `Null`, on any modification
    /// of `key`). Never inspects `state` — a key already at the expected
    /// value will not satisfy this until it changes away and back.
    pub async fn wait_for(&self, key: &str, value: Value, timeout: Option<Duration>) -> bool {
        let mut keyvalues = BTreeMap::new();
        keyvalues.insert(key.to_string(), value);
        self.wait_for_any(&keyvalues, timeout).await
    }

    /// Edge-triggered over several keys at once; see [`Controller::wait_for`].
    pub async fn wait_for_any(&self, keyvalues: &BTreeMap<String, Value>, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        self.wait_for_any_deadline(keyvalues, deadline).await
    }

    async fn wait_for_any_deadline(&self, keyvalues: &BTreeMap<String, Value>, deadline: Option<Instant>) -> bool {
        loop {
            let diff = match self.dequeue_until(deadline, false).await {
                Some(diff) => diff,
                None => return false,
            };
            for (key, value) in &diff {
                if let Some(expected) = keyvalues.get(key) {
                    if expected.is_null() || value == expected {
                        return true;
                    }
                }
            }
        }
    }

    /// Level-triggered: convenience for [`Controller::wait_until_all_unless`]
    /// with a single expectation and no exceptions.
    pub async fn wait_until(&self, key: &str, value: Value, timeout: Option<Duration>) -> bool {
        let mut expectations = BTreeMap::new();
        expectations.insert(key.to_string(), value);
        self.wait_until_all_unless(&expectations, &BTreeMap::new(), timeout).await
    }

    /// Level-triggered with exception short-circuit: returns true as soon as
    /// either some exception key matches its exceptional value, or every
    /// expectation key matches its expected value. An expectation key absent
    /// from `state` is not a match.
    pub async fn wait_until_all_unless(
        &self,
        expectations: &BTreeMap<String, Value>,
        exceptions: &BTreeMap<String, Value>,
        timeout: Option<Duration>,
    ) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            self.sync().await;
            {
                let state = self.state.read().await;
                if exceptions.iter().any(|(k, v)| state.get(k) == Some(v)) {
                    return true;
                }
                if expectations.iter().all(|(k, v)| state.get(k) == Some(v)) {
                    return true;
                }
            }

            let mut union = expectations.clone();
            union.extend(exceptions.clone());
            if !self.wait_for_any_deadline(&union, deadline).await {
                return false;
            }
        }
    }

    /// Reads `state` without draining the queue. A variant-mismatched or
    /// absent key returns `default`.
    pub async fn get(&self, key: &str, default: Value) -> Value {
        self.state.read().await.get(key).cloned().unwrap_or(default)
    }

    pub async fn get_string(&self, key: &str, default: &str) -> String {
        match self.state.read().await.get(key) {
            Some(Value::Str(s)) => s.clone(),
            _ => default.to_string(),
        }
    }

    pub async fn get_integer(&self, key: &str, default: i32) -> i32 {
        match self.state.read().await.get(key) {
            Some(Value::Int(n)) => *n,
            _ => default,
        }
    }

    pub async fn get_boolean(&self, key: &str, default: bool) -> bool {
        match self.state.read().await.get(key) {
            Some(Value::Bool(b)) => *b,
            _ => default,
        }
    }

    pub async fn sync_and_get(&self, key: &str, default: Value) -> Value {
        self.sync().await;
        self.get(key, default).await
    }

    pub async fn sync_and_get_string(&self, key: &str, default: &str) -> String {
        self.sync().await;
        self.get_string(key, default).await
    }

    pub async fn sync_and_get_integer(&self, key: &str, default: i32) -> i32 {
        self.sync().await;
        self.get_integer(key, default).await
    }

    pub async fn sync_and_get_boolean(&self, key: &str, default: bool) -> bool {
        self.sync().await;
        self.get_boolean(key, default).await
    }

    /// Writes through `Memory`; this `Controller` will see its own write as
    /// an enqueued diff like any other observer, and must not suppress it.
    pub async fn set(&self, key: impl Into<String>, value: Value) {
        let mut keyvalues = BTreeMap::new();
        keyvalues.insert(key.into(), value);
        self.memory.write(keyvalues).await;
    }

    pub async fn set_many(&self, keyvalues: BTreeMap<String, Value>) {
        self.memory.write(keyvalues).await;
    }
}
