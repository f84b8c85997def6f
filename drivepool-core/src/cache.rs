//! Expiring key/value cache.
//!
//! [`TtlCache`] maps string keys to values that expire after a per-entry or
//! default time-to-live. Expired entries are hidden from reads immediately
//! and physically removed by a background sweep task that runs on a fixed
//! interval.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use drivepool_core::cache::TtlCache;
//!
//! let cache = TtlCache::new(Duration::from_secs(60), Duration::from_secs(10));
//! cache.set("greeting", "hello".to_string(), None);
//! assert_eq!(cache.get("greeting").as_deref(), Some("hello"));
//!
//! // Stop the sweep task during process shutdown.
//! cache.shutdown();
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

type Entries<V> = RwLock<HashMap<String, Entry<V>>>;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    /// `None` for entries stored with a zero TTL, which never expire.
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| deadline > now)
    }
}

/// In-memory cache with time-based expiry and a periodic sweep.
///
/// # Thread Safety
///
/// Entries live behind a `RwLock` shared with the sweep task. Locks are
/// held only for the duration of a single map operation.
///
/// # Staleness
///
/// The sweep only reclaims memory. Reads compare the entry deadline with the
/// current time themselves, so an entry is never returned after its TTL has
/// elapsed even if the sweep has not run yet.
pub struct TtlCache<V> {
    entries: Arc<Entries<V>>,
    default_ttl: Duration,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache and start its sweep task.
    ///
    /// The sweep task is spawned on the current tokio runtime. When called
    /// outside a runtime, or with a zero `sweep_interval`, the cache works
    /// without a sweep and expired entries are only removed by
    /// [`purge_expired`](Self::purge_expired), [`delete`](Self::delete) or
    /// overwrites.
    pub fn new(default_ttl: Duration, sweep_interval: Duration) -> Self {
        let cache = Self::without_sweeper(default_ttl);

        if sweep_interval.is_zero() {
            tracing::debug!("Cache sweep disabled (zero interval)");
            return cache;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(sweep(Arc::downgrade(&cache.entries), sweep_interval));
                *cache.sweeper.lock() = Some(task);
            }
            Err(_) => {
                tracing::warn!(
                    "No tokio runtime available, cache sweep disabled. \
                     Expired entries are hidden but not reclaimed."
                );
            }
        }

        cache
    }

    /// Create a cache without a background sweep task.
    pub fn without_sweeper(default_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            default_ttl,
            sweeper: Mutex::new(None),
        }
    }

    /// The TTL applied when [`set`](Self::set) is called without one.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Store a value, replacing any previous value for the key.
    ///
    /// `ttl` defaults to the cache's default TTL. A zero TTL, or one too
    /// large to add to the current instant, stores the value without expiry.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let entry = self.entry(value, ttl, Instant::now());
        self.entries.write().insert(key.into(), entry);
    }

    /// Store several values at once, only if the live value under
    /// `guard_key` satisfies `guard`.
    ///
    /// The check and the writes happen under one write lock, so no other
    /// writer can slip in between them. Returns `false` without writing
    /// when the guard entry is missing, expired or rejected.
    pub fn set_all_if<F>(
        &self,
        guard_key: &str,
        guard: F,
        writes: Vec<(String, V, Option<Duration>)>,
    ) -> bool
    where
        F: FnOnce(&V) -> bool,
    {
        let now = Instant::now();
        let mut entries = self.entries.write();

        let accepted = entries
            .get(guard_key)
            .filter(|entry| entry.is_live(now))
            .is_some_and(|entry| guard(&entry.value));
        if !accepted {
            return false;
        }

        for (key, value, ttl) in writes {
            let entry = self.entry(value, ttl, now);
            entries.insert(key, entry);
        }
        true
    }

    fn entry(&self, value: V, ttl: Option<Duration>, now: Instant) -> Entry<V> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        // Zero, or too far out to represent, means no deadline.
        let expires_at = if ttl.is_zero() {
            None
        } else {
            now.checked_add(ttl)
        };
        Entry { value, expires_at }
    }

    /// Retrieve a live value.
    ///
    /// Returns `None` if the key doesn't exist or its TTL has elapsed.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    /// Check whether a live value exists, without touching its TTL.
    pub fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .read()
            .get(key)
            .is_some_and(|entry| entry.is_live(now))
    }

    /// Remove an entry.
    ///
    /// Returns `true` if a live value was removed. Removing a missing key
    /// is not an error.
    pub fn delete(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .write()
            .remove(key)
            .is_some_and(|entry| entry.is_live(now))
    }

    /// Remove every entry whose TTL has elapsed.
    ///
    /// Returns the number of entries removed. This is the same pass the
    /// sweep task runs on each tick.
    pub fn purge_expired(&self) -> usize {
        purge(&self.entries, Instant::now())
    }

    /// Number of stored entries, including expired ones awaiting the sweep.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Whether the sweep task is still running.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stop the sweep task.
    ///
    /// The cache stays usable afterwards; expired entries are still hidden
    /// from reads. Calling this more than once is a no-op.
    pub fn shutdown(&self) {
        if let Some(task) = self.sweeper.lock().take() {
            task.abort();
            tracing::debug!("Cache sweep stopped");
        }
    }
}

impl<V> Drop for TtlCache<V> {
    fn drop(&mut self) {
        if let Some(task) = self.sweeper.get_mut().take() {
            task.abort();
        }
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.entries.read().len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

fn purge<V>(entries: &Entries<V>, now: Instant) -> usize {
    let mut entries = entries.write();
    let before = entries.len();
    entries.retain(|_, entry| entry.is_live(now));
    before - entries.len()
}

/// Sweep loop. Holds only a weak reference so a dropped cache ends the task.
async fn sweep<V>(entries: Weak<Entries<V>>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately; nothing can have expired yet.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let Some(entries) = entries.upgrade() else {
            break;
        };

        let removed = purge(&entries, Instant::now());
        if removed > 0 {
            tracing::debug!(removed, "Swept expired cache entries");
        }
    }
}
