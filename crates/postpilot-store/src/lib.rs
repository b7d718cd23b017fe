//! # PostPilot Store
//! Path-addressed mutable state tree shared by all scheduled actions.
//!
//! The store holds a single JSON tree addressed by path segments. Actions
//! read and write it during invocations to remember side effects across
//! runs (which image hashes were posted, and so on); the lifecycle layer
//! persists a snapshot at shutdown when the dirty flag is set.
//!
//! Mutations are serialized by an internal lock so concurrently firing
//! invocations on a multi-threaded runtime stay safe. Subscribers are
//! notified after a mutation is visible: the state lock is released and
//! the subscriber list snapshotted before any callback runs, so a
//! callback may read from (or even write to) the store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value};

/// One step of a store path: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for Segment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<&String> for Segment {
    fn from(key: &String) -> Self {
        Self::Key(key.clone())
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Subscriber callback, invoked synchronously after every mutation.
pub type Subscriber = Arc<dyn Fn(&Store) + Send + Sync>;

/// Path-addressed state tree with change notification and a dirty flag.
pub struct Store {
    state: Mutex<Value>,
    subscribers: Mutex<Vec<Subscriber>>,
    dirty: AtomicBool,
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::with_state(Value::Object(Map::new()))
    }

    /// Create a store from a previously persisted snapshot.
    ///
    /// Loading is not a mutation: the store starts clean.
    pub fn with_state(state: Value) -> Self {
        Self {
            state: Mutex::new(state),
            subscribers: Mutex::new(Vec::new()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Register a change callback. Callbacks run in registration order.
    pub fn subscribe(&self, callback: impl Fn(&Store) + Send + Sync + 'static) {
        lock(&self.subscribers).push(Arc::new(callback));
    }

    /// Read the value at `path`, or `default` when any segment is absent.
    pub fn get<P>(&self, path: P, default: Value) -> Value
    where
        P: IntoIterator,
        P::Item: Into<Segment>,
    {
        let state = lock(&self.state);
        let mut node = &*state;
        for segment in path {
            let segment: Segment = segment.into();
            let next = match (&segment, node) {
                (Segment::Key(key), Value::Object(map)) => map.get(key),
                (Segment::Index(index), Value::Array(items)) => items.get(*index),
                _ => None,
            };
            match next {
                Some(value) => node = value,
                None => return default,
            }
        }
        node.clone()
    }

    /// Write `value` at `path`, creating intermediate containers as
    /// needed. Marks the store dirty and notifies every subscriber.
    ///
    /// A scalar sitting where a container is needed is replaced by a
    /// fresh container; siblings along the path are untouched.
    pub fn set<P>(&self, path: P, value: Value)
    where
        P: IntoIterator,
        P::Item: Into<Segment>,
    {
        {
            let mut state = lock(&self.state);
            let mut node = &mut *state;
            for segment in path {
                let segment: Segment = segment.into();
                node = descend(node, &segment);
            }
            *node = value;
            self.dirty.store(true, Ordering::SeqCst);
        }

        let subscribers: Vec<Subscriber> = lock(&self.subscribers).clone();
        for callback in subscribers {
            callback(self);
        }
    }

    /// Whether any `set` happened since construction or the last
    /// [`clear_dirty`](Self::clear_dirty).
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Reset the dirty flag, typically after a successful flush.
    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::SeqCst);
    }

    /// Deep copy of the full tree, for persistence.
    pub fn snapshot(&self) -> Value {
        lock(&self.state).clone()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

/// Step into (and if needed create) the slot for one path segment.
fn descend<'a>(node: &'a mut Value, segment: &Segment) -> &'a mut Value {
    match segment {
        Segment::Key(key) => {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            node.as_object_mut()
                .expect("object ensured above")
                .entry(key.clone())
                .or_insert(Value::Null)
        }
        Segment::Index(index) => {
            if !node.is_array() {
                *node = Value::Array(Vec::new());
            }
            let items = node.as_array_mut().expect("array ensured above");
            if items.len() <= *index {
                items.resize(index + 1, Value::Null);
            }
            &mut items[*index]
        }
    }
}

/// Lock helper that survives a poisoned mutex; the store must never fail.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
