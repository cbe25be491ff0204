//! Shared key-value store connecting the display and control surfaces
//!
//! Each surface owns one store handle (one "context"). A write made through a
//! handle is visible to every other handle on the next `get`, and every other
//! handle that subscribed receives a [`StoreChange`]. The writer never hears
//! about its own writes.
//!
//! Backends:
//! - **memory**: in-process hub, one context per surface (tests, single process)
//! - **file**: one file per key in a directory, polled by a watcher thread
//!
//! There are no transactions and no multi-key atomicity. Per-key writes are
//! last-write-wins.

pub mod file;
pub mod memory;
pub mod schema;

use std::sync::mpsc::Receiver;
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryHub;
pub use schema::{KeyClass, SharedState};

/// A key changed in another context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub key: String,
    /// New value, `None` when the key was removed
    pub value: Option<String>,
}

impl StoreChange {
    pub fn new(key: impl Into<String>, value: Option<String>) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid key {0:?}")]
    InvalidKey(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Keyed string storage shared between execution contexts
pub trait SharedStore {
    /// Human-readable backend name for logging
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Overwrite `key`. Writing the value already stored is a no-op and
    /// notifies nobody.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Delete `key`. Removing an absent key is a no-op.
    fn remove(&self, key: &str) -> StoreResult<()>;

    /// Receive changes written by other contexts
    fn subscribe(&self) -> Receiver<StoreChange>;
}
