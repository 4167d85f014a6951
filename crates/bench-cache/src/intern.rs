//! Metadata interning cache (§4.C): a natural-key → materialized-row map,
//! never expired during process lifetime, plus the `recordCached` contract.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;

use tokio::sync::RwLock;

#[derive(Debug)]
pub struct InterningCache<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for InterningCache<K, V> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> InterningCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.inner.read().await.get(key).cloned()
    }

    pub async fn insert(&self, key: K, value: V) {
        self.inner.write().await.insert(key, value);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    /// The `recordCached` contract:
    /// 1. cache hit -> return the cached row;
    /// 2. else run `fetch`; a `Some` result is cached and returned;
    /// 3. else run `insert`; on a unique-violation (per `is_unique_violation`)
    ///    re-run `fetch` — exactly one row must now exist;
    /// 4. any other error from `fetch`/`insert` propagates.
    ///
    /// Last-writer-wins on the in-memory cache: concurrent callers racing on
    /// the same key may each write, but both write an equal row, so the
    /// final cached value is correct either way.
    pub async fn record_cached<F, Fut1, I, Fut2, E>(
        &self,
        key: K,
        fetch: F,
        insert: I,
        is_unique_violation: impl Fn(&E) -> bool,
    ) -> Result<V, E>
    where
        F: Fn() -> Fut1,
        Fut1: Future<Output = Result<Option<V>, E>>,
        I: Fn() -> Fut2,
        Fut2: Future<Output = Result<(), E>>,
    {
        if let Some(v) = self.get(&key).await {
            return Ok(v);
        }

        if let Some(v) = fetch().await? {
            self.insert(key, v.clone()).await;
            return Ok(v);
        }

        match insert().await {
            Ok(()) => {}
            Err(e) if is_unique_violation(&e) => {}
            Err(e) => return Err(e),
        }

        let v = fetch()
            .await?
            .expect("row must exist after insert or unique-violation recovery");
        self.insert(key, v.clone()).await;
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    #[allow(dead_code)]
    struct Never;

    #[tokio::test]
    async fn cache_hit_never_touches_fetch_or_insert() {
        let cache: InterningCache<String, i32> = InterningCache::new();
        cache.insert("a".to_string(), 1).await;

        let fetch_calls = AtomicUsize::new(0);
        let v = cache
            .record_cached::<_, _, _, _, Never>(
                "a".to_string(),
                || async {
                    fetch_calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(999))
                },
                || async { Ok(()) },
                |_| false,
            )
            .await
            .unwrap();

        assert_eq!(v, 1);
        assert_eq!(fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fetch_hit_populates_cache_without_inserting() {
        let cache: InterningCache<String, i32> = InterningCache::new();
        let insert_calls = AtomicUsize::new(0);

        let v = cache
            .record_cached::<_, _, _, _, Never>(
                "a".to_string(),
                || async { Ok(Some(7)) },
                || async {
                    insert_calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
                |_| false,
            )
            .await
            .unwrap();

        assert_eq!(v, 7);
        assert_eq!(insert_calls.load(Ordering::SeqCst), 0);
        assert_eq!(cache.get(&"a".to_string()).await, Some(7));
    }

    #[tokio::test]
    async fn unique_violation_on_insert_recovers_via_refetch() {
        let cache: InterningCache<String, i32> = InterningCache::new();
        let fetch_calls = AtomicUsize::new(0);

        let v = cache
            .record_cached(
                "a".to_string(),
                || {
                    let n = fetch_calls.fetch_add(1, Ordering::SeqCst);
                    async move { Ok::<_, &'static str>(if n == 0 { None } else { Some(42) }) }
                },
                || async { Err("duplicate key") },
                |_| true,
            )
            .await
            .unwrap();

        assert_eq!(v, 42);
        assert_eq!(fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_unique_insert_error_propagates() {
        let cache: InterningCache<String, i32> = InterningCache::new();

        let err = cache
            .record_cached(
                "a".to_string(),
                || async { Ok(None) },
                || async { Err("connection reset") },
                |_| false,
            )
            .await
            .unwrap_err();

        assert_eq!(err, "connection reset");
    }
}
