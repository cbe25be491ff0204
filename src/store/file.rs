//! Directory-backed store shared between processes
//!
//! Every key is a file named after the key inside the store directory, holding
//! the raw value. Writes go to a hidden temp file first and are then renamed
//! over the key file, so a reader never sees a half-written value and writes
//! to different keys never touch each other.
//!
//! Change notification is a watcher thread that rescans the directory on a
//! fixed interval and diffs it against the last snapshot. This handle's own
//! writes update that snapshot while holding its lock, so they are never
//! reported back.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{SharedStore, StoreChange, StoreError, StoreResult};
use crate::constants::paths;

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

struct WatchShared {
    /// Last values this handle knows about (scanned or written by us)
    known: Mutex<HashMap<String, String>>,
    subscribers: Mutex<Vec<Sender<StoreChange>>>,
    watcher_started: AtomicBool,
    stop: AtomicBool,
}

pub struct FileStore {
    dir: PathBuf,
    watch_interval: Duration,
    shared: Arc<WatchShared>,
}

impl FileStore {
    /// Open (creating if needed) the store directory
    pub fn open(dir: impl AsRef<Path>, watch_interval: Duration) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let initial = scan_dir(&dir)?;
        info!(path = %dir.display(), keys = initial.len(), "Opened file store");

        Ok(Self {
            dir,
            watch_interval,
            shared: Arc::new(WatchShared {
                known: Mutex::new(initial),
                subscribers: Mutex::new(Vec::new()),
                watcher_started: AtomicBool::new(false),
                stop: AtomicBool::new(false),
            }),
        })
    }

    fn key_path(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(key))
    }

    fn known(&self) -> StoreResult<MutexGuard<'_, HashMap<String, String>>> {
        self.shared
            .known
            .lock()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))
    }

    fn spawn_watcher(&self) {
        if self.shared.watcher_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let dir = self.dir.clone();
        let interval = self.watch_interval;
        let shared = Arc::clone(&self.shared);
        thread::spawn(move || {
            debug!(path = %dir.display(), interval_ms = interval.as_millis() as u64, "Store watcher started");
            watch_loop(&dir, interval, &shared);
            debug!(path = %dir.display(), "Store watcher stopped");
        });
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::SeqCst);
    }
}

impl SharedStore for FileStore {
    fn name(&self) -> &str {
        "FileStore"
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.key_path(key)?;
        read_value(&path)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.key_path(key)?;
        let mut known = self.known()?;

        if read_value(&path)?.as_deref() == Some(value) {
            known.insert(key.to_string(), value.to_string());
            return Ok(());
        }

        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = self.dir.join(format!(
            ".{key}.{}.{seq}.{}",
            std::process::id(),
            paths::TEMP_SUFFIX
        ));
        fs::write(&tmp, value)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        known.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let path = self.key_path(key)?;
        let mut known = self.known()?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        known.remove(key);
        Ok(())
    }

    fn subscribe(&self) -> Receiver<StoreChange> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut subs) = self.shared.subscribers.lock() {
            subs.push(tx);
        }
        self.spawn_watcher();
        rx
    }
}

/// Tracks a run of failed scans so each outage is reported once
#[derive(Debug, Default)]
struct ScanHealth {
    failures: u32,
}

impl ScanHealth {
    /// Record a failed scan; true for the first failure of a run
    fn failed(&mut self) -> bool {
        self.failures += 1;
        self.failures == 1
    }

    /// Record a good scan, returning how many failures it ended
    fn recovered(&mut self) -> u32 {
        std::mem::take(&mut self.failures)
    }
}

fn watch_loop(dir: &Path, interval: Duration, shared: &WatchShared) {
    let mut health = ScanHealth::default();
    while !shared.stop.load(Ordering::SeqCst) {
        thread::sleep(interval);

        let changes = {
            let Ok(mut known) = shared.known.lock() else {
                warn!("Store watcher lock poisoned, stopping");
                return;
            };
            // Scan under the lock so our own writes can't interleave with the diff
            let current = match scan_dir(dir) {
                Ok(current) => current,
                Err(e) => {
                    if health.failed() {
                        warn!(
                            path = %dir.display(),
                            error = %e,
                            "Store scan failed, changes from other surfaces are not seen"
                        );
                    } else {
                        debug!(path = %dir.display(), error = %e, "Store scan still failing");
                    }
                    continue;
                }
            };
            let failures = health.recovered();
            if failures > 0 {
                info!(path = %dir.display(), failures, "Store scan recovered");
            }
            let changes = diff_snapshots(&known, &current);
            *known = current;
            changes
        };

        if changes.is_empty() {
            continue;
        }

        let Ok(mut subs) = shared.subscribers.lock() else {
            return;
        };
        for change in changes {
            debug!(key = %change.key, "External store change");
            subs.retain(|tx| tx.send(change.clone()).is_ok());
        }
        if subs.is_empty() {
            debug!("No store subscribers left");
        }
    }
}

fn validate_key(key: &str) -> StoreResult<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

fn read_value(path: &Path) -> StoreResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn scan_dir(dir: &Path) -> StoreResult<HashMap<String, String>> {
    let mut values = HashMap::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with('.') || !entry.file_type()?.is_file() {
            continue;
        }
        // A concurrent remove between read_dir and read is just an absent key
        if let Some(value) = read_value(&entry.path())? {
            values.insert(name, value);
        }
    }
    Ok(values)
}

fn diff_snapshots(
    before: &HashMap<String, String>,
    after: &HashMap<String, String>,
) -> Vec<StoreChange> {
    let mut changes: Vec<StoreChange> = after
        .iter()
        .filter(|(key, value)| before.get(*key) != Some(*value))
        .map(|(key, value)| StoreChange::new(key.clone(), Some(value.clone())))
        .collect();
    changes.extend(
        before
            .keys()
            .filter(|key| !after.contains_key(*key))
            .map(|key| StoreChange::new(key.clone(), None)),
    );
    changes.sort_by(|a, b| a.key.cmp(&b.key));
    changes
}
