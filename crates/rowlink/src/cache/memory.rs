use crate::cache::Cache;
use core::convert::Infallible;
use core::time::Duration;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::time::Instant;

/// Default idle window after which an entry expires.
pub const DEFAULT_IDLE_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Expired entries are dropped on access; a full sweep runs after this many
/// writes so the map cannot grow without bound on write-heavy workloads.
const SWEEP_INTERVAL: usize = 256;

/// In-process [`Cache`] with a sliding idle window.
///
/// Every entry carries a deadline of `idle_window` from its last use; a `get`
/// hit pushes the deadline out again, so hot keys stay resident while idle
/// ones age out. Lookups never block on I/O: state is a mutex-guarded map
/// with short critical sections and no awaits while locked.
#[derive(Debug)]
pub struct MemoryCache {
    idle_window: Duration,
    entries: Mutex<Entries>,
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, Entry>,
    writes_since_sweep: usize,
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl MemoryCache {
    /// Creates a cache with the default idle window of
    /// [`DEFAULT_IDLE_WINDOW`].
    pub fn new() -> Self {
        Self::with_idle_window(DEFAULT_IDLE_WINDOW)
    }

    /// Creates a cache whose entries expire after `idle_window` without use.
    pub fn with_idle_window(idle_window: Duration) -> Self {
        Self {
            idle_window,
            entries: Mutex::new(Entries::default()),
        }
    }

    /// Number of retained entries, counting expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for MemoryCache {
    type Error = Infallible;

    async fn get(&self, key: &str) -> Result<Option<String>, Infallible> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.map.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.expires_at = now + self.idle_window;
                Ok(Some(entry.value.clone()))
            }
            Some(_) => {
                entries.map.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Infallible> {
        let expires_at = Instant::now() + self.idle_window;
        let mut entries = self.entries.lock();
        entries.map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        entries.writes_since_sweep += 1;
        if entries.writes_since_sweep >= SWEEP_INTERVAL {
            let now = Instant::now();
            entries.map.retain(|_, entry| entry.expires_at > now);
            entries.writes_since_sweep = 0;
        }
        Ok(())
    }
}
