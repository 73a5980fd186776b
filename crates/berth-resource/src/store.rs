//! The reservation store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;

/// How long an unconsumed reservation lives before its cleanup actions run.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3 * 60);

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors returned by the reservation cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A live entry already exists for the name.
    #[error("resource named {0} already exists in the cache")]
    DuplicateKey(String),
}

/// A resource that can be parked in the cache.
///
/// `mark_created` is invoked exactly once, by the consumer that wins the
/// entry; expiry never calls it.
pub trait ResourceHandle: Send {
    /// The identifier handed to the consumer.
    fn identifier(&self) -> String;

    /// Marks the resource as created (claimed by its consumer).
    fn mark_created(&mut self);
}

/// Cleanup action run when an entry expires unconsumed.
pub type CleanupFn = Box<dyn FnOnce() + Send>;

struct CacheEntry {
    resource: Box<dyn ResourceHandle>,
    cleanup: Vec<CleanupFn>,
    timer: JoinHandle<()>,
}

/// Keyed store handing out each reservation at most once.
///
/// [`add`](Self::add) parks a resource under a unique name and arms a TTL
/// timer; [`get`](Self::get) atomically consumes the entry. The
/// consume-vs-expire race is resolved by a single `HashMap::remove` under
/// one mutex: whichever side removes the entry first wins, and the loser
/// observes absence.
pub struct ResourceCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    ttl: Duration,
}

impl ResourceCache {
    /// Creates a cache with the default TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Creates a cache with a custom TTL.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Parks `resource` under `name` and arms its expiry timer.
    ///
    /// On expiry the cleanup actions run in registration order, exactly
    /// once, and the entry is removed. Must be called from within a tokio
    /// runtime (the timer is a spawned task).
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::DuplicateKey`] if a live entry already exists
    /// for `name`; the cache is left unchanged.
    pub fn add(
        &self,
        name: &str,
        resource: Box<dyn ResourceHandle>,
        cleanup: Vec<CleanupFn>,
    ) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.contains_key(name) {
            return Err(CacheError::DuplicateKey(name.to_string()));
        }

        // The timer contends on the same lock we hold, so the entry is
        // always in place before the timer can observe the map.
        let timer = tokio::spawn(expire_after(
            Arc::clone(&self.entries),
            name.to_string(),
            self.ttl,
        ));

        entries.insert(
            name.to_string(),
            CacheEntry {
                resource,
                cleanup,
                timer,
            },
        );
        Ok(())
    }

    /// Consumes the entry for `name`, returning its resource identifier.
    ///
    /// The winning call cancels the expiry timer, removes the entry, and
    /// marks the resource created. A miss (never added, already consumed,
    /// or already expired) returns the empty string; that is the designed
    /// miss signal, not an error.
    #[must_use]
    pub fn get(&self, name: &str) -> String {
        let entry = self.entries.lock().remove(name);
        match entry {
            Some(mut entry) => {
                entry.timer.abort();
                entry.resource.mark_created();
                entry.resource.identifier()
            }
            None => String::new(),
        }
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer body: reclaim the entry if it is still unconsumed after `ttl`.
async fn expire_after(
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    name: String,
    ttl: Duration,
) {
    tokio::time::sleep(ttl).await;

    // Take the entry under the lock, then run cleanup outside it.
    let entry = entries.lock().remove(&name);
    if let Some(entry) = entry {
        tracing::debug!("reservation {name} expired unconsumed, running cleanup");
        for cleanup in entry.cleanup {
            cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Session {
        id: String,
        marks: Arc<AtomicUsize>,
    }

    impl Session {
        fn boxed(id: &str) -> Box<Self> {
            Box::new(Self {
                id: id.to_string(),
                marks: Arc::new(AtomicUsize::new(0)),
            })
        }

        fn boxed_with_marks(id: &str, marks: Arc<AtomicUsize>) -> Box<Self> {
            Box::new(Self {
                id: id.to_string(),
                marks,
            })
        }
    }

    impl ResourceHandle for Session {
        fn identifier(&self) -> String {
            self.id.clone()
        }

        fn mark_created(&mut self) {
            self.marks.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_get_consumes_entry_once() {
        let cache = ResourceCache::new();
        let marks = Arc::new(AtomicUsize::new(0));
        cache
            .add("sess-1", Session::boxed_with_marks("abc", Arc::clone(&marks)), Vec::new())
            .unwrap();

        assert_eq!(cache.get("sess-1"), "abc");
        assert_eq!(marks.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get("sess-1"), "");
        assert_eq!(marks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_unknown_name_is_a_miss() {
        let cache = ResourceCache::new();
        assert_eq!(cache.get("never-added"), "");
    }

    #[tokio::test]
    async fn test_duplicate_add_rejected() {
        let cache = ResourceCache::new();
        cache.add("sess-1", Session::boxed("abc"), Vec::new()).unwrap();

        let err = cache
            .add("sess-1", Session::boxed("def"), Vec::new())
            .unwrap_err();
        assert!(matches!(err, CacheError::DuplicateKey(name) if name == "sess-1"));

        // The original reservation is untouched.
        assert_eq!(cache.get("sess-1"), "abc");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_runs_cleanup_in_order() {
        let cache = ResourceCache::with_ttl(Duration::from_secs(5));
        let order = Arc::new(Mutex::new(Vec::new()));

        let cleanup: Vec<Box<dyn FnOnce() + Send>> = vec![
            {
                let order = Arc::clone(&order);
                Box::new(move || order.lock().push(1))
            },
            {
                let order = Arc::clone(&order);
                Box::new(move || order.lock().push(2))
            },
        ];
        cache.add("sess-1", Session::boxed("abc"), cleanup).unwrap();

        tokio::time::sleep(Duration::from_secs(6)).await;
        tokio::task::yield_now().await;

        assert_eq!(order.lock().clone(), vec![1, 2]);
        assert_eq!(cache.get("sess-1"), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_consumption_cancels_expiry() {
        let cache = ResourceCache::with_ttl(Duration::from_secs(5));
        let cleaned = Arc::new(Mutex::new(false));

        let cleanup: Vec<Box<dyn FnOnce() + Send>> = vec![{
            let cleaned = Arc::clone(&cleaned);
            Box::new(move || *cleaned.lock() = true)
        }];
        cache.add("sess-1", Session::boxed("abc"), cleanup).unwrap();

        assert_eq!(cache.get("sess-1"), "abc");

        tokio::time::sleep(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;

        assert!(!*cleaned.lock());
    }

    #[tokio::test(start_paused = true)]
    async fn test_name_reusable_after_expiry() {
        let cache = ResourceCache::with_ttl(Duration::from_secs(5));
        cache.add("sess-1", Session::boxed("abc"), Vec::new()).unwrap();

        tokio::time::sleep(Duration::from_secs(6)).await;
        tokio::task::yield_now().await;

        cache.add("sess-1", Session::boxed("def"), Vec::new()).unwrap();
        assert_eq!(cache.get("sess-1"), "def");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_gets_have_one_winner() {
        let cache = Arc::new(ResourceCache::new());
        cache.add("sess-1", Session::boxed("abc"), Vec::new()).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.get("sess-1") }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() == "abc" {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
