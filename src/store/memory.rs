//! In-process store backend
//!
//! [`MemoryHub`] holds the data; each [`MemoryStore`] handed out by
//! [`MemoryHub::context`] behaves like a separate execution context.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::{SharedStore, StoreChange, StoreError, StoreResult};

struct Subscriber {
    context: u64,
    sender: Sender<StoreChange>,
}

struct HubInner {
    data: HashMap<String, String>,
    subscribers: Vec<Subscriber>,
    available: bool,
}

/// Shared backing data for any number of in-process contexts
#[derive(Clone)]
pub struct MemoryHub {
    inner: Arc<Mutex<HubInner>>,
    next_context: Arc<AtomicU64>,
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner {
                data: HashMap::new(),
                subscribers: Vec::new(),
                available: true,
            })),
            next_context: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new context on this hub
    pub fn context(&self) -> MemoryStore {
        let id = self.next_context.fetch_add(1, Ordering::Relaxed);
        debug!(context = id, "Opened memory store context");
        MemoryStore {
            hub: self.clone(),
            id,
        }
    }

    /// Simulate storage being disabled (every operation fails) or restored
    #[cfg(test)]
    pub fn set_available(&self, available: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.available = available;
        }
    }

    /// Copy of all stored values
    #[cfg(test)]
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.inner
            .lock()
            .map(|inner| inner.data.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HubInner>> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        if !guard.available {
            return Err(StoreError::Unavailable("storage disabled".into()));
        }
        Ok(guard)
    }
}

/// One context's handle onto a [`MemoryHub`]
pub struct MemoryStore {
    hub: MemoryHub,
    id: u64,
}

impl MemoryStore {
    fn broadcast(&self, inner: &mut HubInner, change: StoreChange) {
        let writer = self.id;
        inner.subscribers.retain(|sub| {
            if sub.context == writer {
                return true;
            }
            // Drop subscribers whose receiver is gone
            sub.sender.send(change.clone()).is_ok()
        });
    }
}

impl SharedStore for MemoryStore {
    fn name(&self) -> &str {
        "MemoryStore"
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let inner = self.hub.lock()?;
        Ok(inner.data.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut inner = self.hub.lock()?;
        if inner.data.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        inner.data.insert(key.to_string(), value.to_string());
        self.broadcast(&mut inner, StoreChange::new(key, Some(value.to_string())));
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let mut inner = self.hub.lock()?;
        if inner.data.remove(key).is_some() {
            self.broadcast(&mut inner, StoreChange::new(key, None));
        }
        Ok(())
    }

    fn subscribe(&self) -> Receiver<StoreChange> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut inner) = self.hub.inner.lock() {
            inner.subscribers.push(Subscriber {
                context: self.id,
                sender: tx,
            });
        }
        rx
    }
}
