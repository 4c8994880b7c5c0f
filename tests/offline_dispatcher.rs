use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use axum::http::StatusCode;
use folio::application::offline::{
    CacheRequest, CacheStore, CachedResponse, Dispatcher, MemoryCache, Network, NetworkError,
    ResponseSource, RouteTable, Strategy,
};
use time::macros::datetime;
use url::Url;

type Calls = Arc<Mutex<Vec<&'static str>>>;

const CACHE: &str = "folio-v2";

/// Memory cache that records every lookup and store in a shared log.
struct RecordingCache {
    inner: MemoryCache,
    calls: Calls,
}

#[async_trait]
impl CacheStore for RecordingCache {
    async fn lookup(&self, cache: &str, url: &Url) -> Option<CachedResponse> {
        self.calls.lock().expect("calls").push("lookup");
        self.inner.lookup(cache, url).await
    }

    async fn store(&self, cache: &str, url: &Url, response: CachedResponse) {
        self.calls.lock().expect("calls").push("store");
        self.inner.store(cache, url, response).await
    }

    async fn remove(&self, cache: &str, url: &Url) -> bool {
        self.inner.remove(cache, url).await
    }

    async fn keys(&self, cache: &str) -> Vec<Url> {
        self.inner.keys(cache).await
    }

    async fn cache_names(&self) -> Vec<String> {
        self.inner.cache_names().await
    }

    async fn delete_cache(&self, cache: &str) -> bool {
        self.inner.delete_cache(cache).await
    }
}

/// Network that answers with a fixed body, or fails when offline.
struct RecordingNetwork {
    calls: Calls,
    online: bool,
}

#[async_trait]
impl Network for RecordingNetwork {
    async fn fetch(&self, request: &CacheRequest) -> Result<CachedResponse, NetworkError> {
        self.calls.lock().expect("calls").push("fetch");
        if self.online {
            Ok(CachedResponse::ok("fresh"))
        } else {
            Err(NetworkError::new(&request.url, "offline"))
        }
    }
}

struct Harness {
    dispatcher: Dispatcher<RecordingCache, RecordingNetwork>,
    cache: Arc<RecordingCache>,
    calls: Calls,
    site: Url,
}

fn harness(online: bool) -> Harness {
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let site = Url::parse("https://jane.dev/").expect("site url");
    let cache = Arc::new(RecordingCache {
        inner: MemoryCache::new(),
        calls: calls.clone(),
    });
    let network = Arc::new(RecordingNetwork {
        calls: calls.clone(),
        online,
    });
    let dispatcher = Dispatcher::new(
        cache.clone(),
        network,
        RouteTable::with_default_rules(&site),
        CACHE,
        site.join("/offline/").expect("offline url"),
    );
    Harness {
        dispatcher,
        cache,
        calls,
        site,
    }
}

impl Harness {
    fn url(&self, path: &str) -> Url {
        self.site.join(path).expect("join")
    }

    async fn seed(&self, path: &str, body: &'static str) {
        self.cache
            .inner
            .store(CACHE, &self.url(path), CachedResponse::ok(body))
            .await;
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().expect("calls").clone()
    }
}

#[tokio::test]
async fn cache_first_consults_cache_before_network() {
    let h = harness(true);
    h.seed("/images/hero.png", "cached").await;

    let dispatched = h
        .dispatcher
        .handle(CacheRequest::get(h.url("/images/hero.png")))
        .await
        .expect("dispatch");

    assert_eq!(dispatched.strategy, Some(Strategy::CacheFirst));
    assert_eq!(dispatched.source, ResponseSource::Cache);
    assert_eq!(dispatched.response.body.as_ref(), b"cached");
    assert_eq!(h.calls(), vec!["lookup"]);
}

#[tokio::test]
async fn cache_first_miss_fetches_and_stores() {
    let h = harness(true);

    let dispatched = h
        .dispatcher
        .handle(CacheRequest::get(h.url("/styles/site.css")))
        .await
        .expect("dispatch");

    assert_eq!(dispatched.source, ResponseSource::Network);
    assert_eq!(h.calls(), vec!["lookup", "fetch", "store"]);
    assert!(
        h.cache
            .inner
            .lookup(CACHE, &h.url("/styles/site.css"))
            .await
            .is_some()
    );
}

#[tokio::test]
async fn network_first_fetches_before_touching_cache() {
    let h = harness(true);
    h.seed("/rss.xml", "old feed").await;

    let dispatched = h
        .dispatcher
        .handle(CacheRequest::get(h.url("/rss.xml")))
        .await
        .expect("dispatch");

    assert_eq!(dispatched.strategy, Some(Strategy::NetworkFirst));
    assert_eq!(dispatched.source, ResponseSource::Network);
    assert_eq!(dispatched.response.body.as_ref(), b"fresh");
    assert_eq!(h.calls(), vec!["fetch", "store"]);
}

#[tokio::test]
async fn network_first_falls_back_to_cache_when_offline() {
    let h = harness(false);
    h.seed("/rss.xml", "old feed").await;

    let dispatched = h
        .dispatcher
        .handle(CacheRequest::get(h.url("/rss.xml")))
        .await
        .expect("dispatch");

    assert_eq!(dispatched.source, ResponseSource::Cache);
    assert_eq!(dispatched.response.body.as_ref(), b"old feed");
    assert_eq!(h.calls(), vec!["fetch", "lookup"]);
}

#[tokio::test]
async fn stale_while_revalidate_serves_cache_and_refreshes() {
    let h = harness(true);
    h.seed("/blog/", "stale page").await;

    let dispatched = h
        .dispatcher
        .handle(CacheRequest::navigation(h.url("/blog/")))
        .await
        .expect("dispatch");

    assert_eq!(dispatched.strategy, Some(Strategy::StaleWhileRevalidate));
    assert_eq!(dispatched.source, ResponseSource::Cache);
    assert_eq!(dispatched.response.body.as_ref(), b"stale page");

    dispatched
        .revalidation
        .expect("background refresh")
        .await
        .expect("refresh task");
    let refreshed = h
        .cache
        .inner
        .lookup(CACHE, &h.url("/blog/"))
        .await
        .expect("refreshed entry");
    assert_eq!(refreshed.body.as_ref(), b"fresh");
}

#[tokio::test]
async fn offline_navigation_falls_back_to_offline_page() {
    let h = harness(false);
    h.seed("/offline/", "you are offline").await;

    let dispatched = h
        .dispatcher
        .handle(CacheRequest::navigation(h.url("/blog/unseen-post/")))
        .await
        .expect("dispatch");

    assert_eq!(dispatched.source, ResponseSource::OfflinePage);
    assert_eq!(dispatched.response.body.as_ref(), b"you are offline");
}

#[tokio::test]
async fn offline_asset_without_cache_entry_is_an_error() {
    let h = harness(false);

    let result = h
        .dispatcher
        .handle(CacheRequest::get(h.url("/images/missing.png")))
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn cross_origin_requests_pass_through() {
    let h = harness(true);
    let foreign = Url::parse("https://fonts.example.com/font.woff2").expect("url");

    let dispatched = h
        .dispatcher
        .handle(CacheRequest::get(foreign))
        .await
        .expect("dispatch");

    assert_eq!(dispatched.strategy, None);
    assert_eq!(h.calls(), vec!["fetch"]);
}

#[tokio::test]
async fn install_is_all_or_nothing() {
    let h = harness(false);
    let urls = vec![h.url("/"), h.url("/offline/")];

    assert!(h.dispatcher.install(&urls).await.is_err());
    assert!(h.cache.inner.is_empty(CACHE));
}

#[tokio::test]
async fn activate_deletes_previous_versions() {
    let h = harness(true);
    let url = h.url("/");
    h.cache.inner.store("folio-v1", &url, CachedResponse::ok("old")).await;
    h.seed("/", "current").await;

    let deleted = h.dispatcher.activate().await;

    assert_eq!(deleted, vec!["folio-v1".to_string()]);
    assert_eq!(h.cache.inner.cache_names().await, vec![CACHE.to_string()]);
}

#[tokio::test]
async fn sweep_evicts_expired_and_undated_entries() {
    let h = harness(true);
    let now = datetime!(2024-06-30 12:00 UTC);

    let old = CachedResponse::ok("old").with_date(datetime!(2024-05-01 12:00 UTC));
    let recent = CachedResponse::ok("recent").with_date(datetime!(2024-06-20 12:00 UTC));
    h.cache.inner.store(CACHE, &h.url("/old/"), old).await;
    h.cache.inner.store(CACHE, &h.url("/recent/"), recent).await;
    h.seed("/undated/", "undated").await;

    let evicted = h
        .dispatcher
        .sweep(now, Duration::from_secs(30 * 24 * 60 * 60))
        .await;

    assert_eq!(evicted, 2);
    assert_eq!(h.cache.inner.len(CACHE), 1);
    assert!(h.cache.inner.lookup(CACHE, &h.url("/old/")).await.is_none());
    assert!(h.cache.inner.lookup(CACHE, &h.url("/undated/")).await.is_none());
    assert!(h.cache.inner.lookup(CACHE, &h.url("/recent/")).await.is_some());
}

#[tokio::test]
async fn failed_responses_are_not_cached() {
    struct NotFound;

    #[async_trait]
    impl Network for NotFound {
        async fn fetch(&self, _request: &CacheRequest) -> Result<CachedResponse, NetworkError> {
            Ok(CachedResponse::new(StatusCode::NOT_FOUND, "missing"))
        }
    }

    let site = Url::parse("https://jane.dev/").expect("site url");
    let cache = Arc::new(MemoryCache::new());
    let dispatcher = Dispatcher::new(
        cache.clone(),
        Arc::new(NotFound),
        RouteTable::with_default_rules(&site),
        CACHE,
        site.join("/offline/").expect("offline url"),
    );

    let dispatched = dispatcher
        .handle(CacheRequest::get(site.join("/images/gone.png").expect("join")))
        .await
        .expect("dispatch");

    assert_eq!(dispatched.response.status, StatusCode::NOT_FOUND);
    assert!(cache.is_empty(CACHE));
}
