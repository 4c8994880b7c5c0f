use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use url::Url;

use super::dispatcher::{CacheStore, CachedResponse};

/// In-process cache storage with the same semantics as the browser's Cache Storage.
#[derive(Debug, Default)]
pub struct MemoryCache {
    caches: DashMap<String, HashMap<String, CachedResponse>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held by one cache.
    pub fn len(&self, cache: &str) -> usize {
        self.caches.get(cache).map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self, cache: &str) -> bool {
        self.len(cache) == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn lookup(&self, cache: &str, url: &Url) -> Option<CachedResponse> {
        self.caches
            .get(cache)
            .and_then(|entries| entries.get(url.as_str()).cloned())
    }

    async fn store(&self, cache: &str, url: &Url, response: CachedResponse) {
        self.caches
            .entry(cache.to_string())
            .or_default()
            .insert(url.to_string(), response);
    }

    async fn remove(&self, cache: &str, url: &Url) -> bool {
        self.caches
            .get_mut(cache)
            .is_some_and(|mut entries| entries.remove(url.as_str()).is_some())
    }

    async fn keys(&self, cache: &str) -> Vec<Url> {
        let mut keys: Vec<Url> = self
            .caches
            .get(cache)
            .map(|entries| {
                entries
                    .keys()
                    .filter_map(|key| Url::parse(key).ok())
                    .collect()
            })
            .unwrap_or_default();
        keys.sort();
        keys
    }

    async fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    async fn delete_cache(&self, cache: &str) -> bool {
        self.caches.remove(cache).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse("https://jane.dev")
            .and_then(|base| base.join(path))
            .expect("url")
    }

    #[tokio::test]
    async fn stores_per_named_cache() {
        let cache = MemoryCache::new();
        cache
            .store("v1", &url("/a.css"), CachedResponse::ok("a"))
            .await;
        cache
            .store("v2", &url("/a.css"), CachedResponse::ok("b"))
            .await;

        assert_eq!(
            cache.lookup("v1", &url("/a.css")).await.map(|r| r.body),
            Some("a".into())
        );
        assert_eq!(cache.cache_names().await, vec!["v1", "v2"]);
        assert!(cache.delete_cache("v1").await);
        assert!(cache.lookup("v1", &url("/a.css")).await.is_none());
    }

    #[tokio::test]
    async fn remove_reports_whether_entry_existed() {
        let cache = MemoryCache::new();
        cache
            .store("v1", &url("/a.css"), CachedResponse::ok("a"))
            .await;
        assert!(cache.remove("v1", &url("/a.css")).await);
        assert!(!cache.remove("v1", &url("/a.css")).await);
        assert!(cache.is_empty("v1"));
    }
}
