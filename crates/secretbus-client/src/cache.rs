//! Weak-reference proxy registry.
//!
//! Maps a key to the single live proxy for it. The cache holds only weak
//! references; the last strong handle going away is what ends an entry, and
//! the proxy's own `Drop` calls [`ProxyCache::remove_if_dead`] so the slot is
//! freed immediately.
//!
//! Construction is async (it talks to the bus). While one caller builds the
//! proxy for a key, other callers for the same key wait for it rather than
//! building a duplicate. If the builder fails or is cancelled, a waiter takes
//! over.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::trace;

enum Slot<T> {
    Live(Weak<T>),
    Pending(Arc<Notify>),
}

/// Registry of live proxies keyed by identity.
pub struct ProxyCache<K, T> {
    entries: Mutex<HashMap<K, Slot<T>>>,
}

enum Claim<T> {
    Found(Arc<T>),
    Wait(Arc<Notify>),
    Build(Arc<Notify>),
}

impl<K, T> ProxyCache<K, T>
where
    K: Clone + Eq + Hash + std::fmt::Debug,
{
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Live proxy for `key`, if there is one.
    pub fn get(&self, key: &K) -> Option<Arc<T>> {
        match self.entries.lock().get(key) {
            Some(Slot::Live(weak)) => weak.upgrade(),
            _ => None,
        }
    }

    /// Number of keys with a live proxy.
    pub fn live_count(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Live(weak) if weak.strong_count() > 0))
            .count()
    }

    /// Return the live proxy for `key`, or build one with `create`.
    pub async fn get_or_create<F, Fut, E>(&self, key: K, create: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<T>, E>>,
    {
        let notify = loop {
            let notified;
            {
                let mut entries = self.entries.lock();
                match Self::claim(&mut entries, &key) {
                    Claim::Found(proxy) => return Ok(proxy),
                    Claim::Build(notify) => break notify,
                    Claim::Wait(notify) => {
                        // Created under the lock so the builder's wake-up cannot
                        // slip in between releasing it and awaiting.
                        notified = notify.notified_owned();
                    }
                }
            }
            trace!(key = ?key, "waiting for in-flight proxy construction");
            notified.await;
        };

        let mut guard = BuildGuard {
            cache: self,
            key: &key,
            notify,
            armed: true,
        };

        let proxy = create().await?;

        {
            let mut entries = self.entries.lock();
            entries.insert(key.clone(), Slot::Live(Arc::downgrade(&proxy)));
        }
        guard.armed = false;
        guard.notify.notify_waiters();

        Ok(proxy)
    }

    /// Drop the entry for `key` if its proxy is gone.
    ///
    /// Entries that were replaced by a newer live proxy, or that are being
    /// rebuilt, are left alone.
    pub fn remove_if_dead(&self, key: &K) {
        let mut entries = self.entries.lock();
        if let Some(Slot::Live(weak)) = entries.get(key) {
            if weak.strong_count() == 0 {
                entries.remove(key);
                trace!(key = ?key, "released proxy");
            }
        }
    }

    fn claim(entries: &mut HashMap<K, Slot<T>>, key: &K) -> Claim<T> {
        match entries.get(key) {
            Some(Slot::Live(weak)) => {
                if let Some(proxy) = weak.upgrade() {
                    return Claim::Found(proxy);
                }
            }
            Some(Slot::Pending(notify)) => return Claim::Wait(notify.clone()),
            None => {}
        }

        let notify = Arc::new(Notify::new());
        entries.insert(key.clone(), Slot::Pending(notify.clone()));
        Claim::Build(notify)
    }
}

impl<K, T> Default for ProxyCache<K, T>
where
    K: Clone + Eq + Hash + std::fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Clears a pending slot if construction does not finish.
struct BuildGuard<'a, K, T>
where
    K: Clone + Eq + Hash + std::fmt::Debug,
{
    cache: &'a ProxyCache<K, T>,
    key: &'a K,
    notify: Arc<Notify>,
    armed: bool,
}

impl<K, T> Drop for BuildGuard<'_, K, T>
where
    K: Clone + Eq + Hash + std::fmt::Debug,
{
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        {
            let mut entries = self.cache.entries.lock();
            if let Some(Slot::Pending(notify)) = entries.get(self.key) {
                if Arc::ptr_eq(notify, &self.notify) {
                    entries.remove(self.key);
                }
            }
        }
        trace!(key = ?self.key, "proxy construction abandoned");
        self.notify.notify_waiters();
    }
}
