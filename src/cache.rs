//! ### Cache
//! Read-through cache for loaded data with time-based expiry.
//!
//! Results are identical with the cache disabled. Concurrent misses on the
//! same key may both run the loader; whichever finishes last is kept.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Entry<V> {
    loaded_at: Instant,
    value: Arc<V>,
}

pub struct TtlCache<V> {
    ttl: Option<Duration>,
    entries: RwLock<HashMap<String, Entry<V>>>,
}

impl<V> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: (!ttl.is_zero()).then_some(ttl),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self {
            ttl: None,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.ttl.is_some()
    }

    /// Returns the cached value for `key` if it is younger than the TTL,
    /// otherwise runs `load` and stores its result. Errors are passed
    /// through and never stored.
    pub fn get_or_load<E, F>(&self, key: &str, load: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let Some(ttl) = self.ttl else {
            return load().map(Arc::new);
        };

        if let Some(entry) = self.entries.read().get(key) {
            if entry.loaded_at.elapsed() < ttl {
                tracing::debug!(key, "cache hit");
                return Ok(entry.value.clone());
            }
        }
        tracing::debug!(key, "cache miss");

        // The loader runs without holding the lock.
        let value = Arc::new(load()?);
        self.entries.write().insert(
            key.to_string(),
            Entry {
                loaded_at: Instant::now(),
                value: value.clone(),
            },
        );
        Ok(value)
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.write().remove(key);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn counting_loader(calls: &AtomicUsize) -> impl FnOnce() -> Result<Vec<u32>, String> + '_ {
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1, 2, 3])
        }
    }

    #[test]
    fn fresh_entry_is_reused() {
        let cache = TtlCache::new(Duration::from_secs(3600));
        let calls = AtomicUsize::new(0);

        let first = cache.get_or_load("ev_load", counting_loader(&calls)).unwrap();
        let second = cache.get_or_load("ev_load", counting_loader(&calls)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn keys_are_independent() {
        let cache = TtlCache::new(Duration::from_secs(3600));
        let calls = AtomicUsize::new(0);
        cache.get_or_load("a", counting_loader(&calls)).unwrap();
        cache.get_or_load("b", counting_loader(&calls)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn disabled_cache_always_loads() {
        let cache = TtlCache::disabled();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let value = cache.get_or_load("ev_load", counting_loader(&calls)).unwrap();
            assert_eq!(*value, vec![1, 2, 3]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(cache.is_empty());

        let zero_ttl = TtlCache::<Vec<u32>>::new(Duration::ZERO);
        assert!(!zero_ttl.is_enabled());
    }

    #[test]
    fn errors_are_not_cached() {
        let cache = TtlCache::new(Duration::from_secs(3600));
        let failed: Result<Arc<Vec<u32>>, String> =
            cache.get_or_load("ev_load", || Err("unreachable".to_string()));
        assert!(failed.is_err());
        assert!(cache.is_empty());

        let calls = AtomicUsize::new(0);
        cache.get_or_load("ev_load", counting_loader(&calls)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn expired_entry_reloads() {
        let cache = TtlCache::new(Duration::from_millis(20));
        let calls = AtomicUsize::new(0);
        cache.get_or_load("ev_load", counting_loader(&calls)).unwrap();
        thread::sleep(Duration::from_millis(40));
        cache.get_or_load("ev_load", counting_loader(&calls)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn invalidate_forces_reload() {
        let cache = TtlCache::new(Duration::from_secs(3600));
        let calls = AtomicUsize::new(0);
        cache.get_or_load("ev_load", counting_loader(&calls)).unwrap();
        cache.invalidate("ev_load");
        cache.get_or_load("ev_load", counting_loader(&calls)).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_population_is_consistent() {
        let cache = TtlCache::new(Duration::from_secs(3600));
        let calls = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let value = cache.get_or_load("ev_load", counting_loader(&calls)).unwrap();
                    assert_eq!(*value, vec![1, 2, 3]);
                });
            }
        });

        let loads = calls.load(Ordering::SeqCst);
        assert!((1..=8).contains(&loads));
        assert_eq!(cache.len(), 1);
    }
}
