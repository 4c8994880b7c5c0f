//! Executes the caching strategy chosen for each intercepted request.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode, header::DATE};
use bytes::Bytes;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc2822};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::strategy::{CacheRequest, RouteTable, Strategy};

/// A stored or freshly fetched response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, body)
    }

    /// Stamp the `Date` header used by the age sweep.
    pub fn with_date(mut self, at: OffsetDateTime) -> Self {
        if let Some(value) = at
            .format(&Rfc2822)
            .ok()
            .and_then(|value| value.parse().ok())
        {
            self.headers.insert(DATE, value);
        }
        self
    }

    /// Parsed `Date` header, if present and well formed.
    pub fn date(&self) -> Option<OffsetDateTime> {
        let raw = self.headers.get(DATE)?.to_str().ok()?;
        OffsetDateTime::parse(raw, &Rfc2822).ok()
    }

    fn is_cacheable(&self) -> bool {
        self.status == StatusCode::OK
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("network request for `{url}` failed: {reason}")]
pub struct NetworkError {
    pub url: String,
    pub reason: String,
}

impl NetworkError {
    pub fn new(url: &Url, reason: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum OfflineError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("precache of `{url}` returned status {status}")]
    Install { url: String, status: StatusCode },
}

/// Named caches keyed by request URL.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    async fn lookup(&self, cache: &str, url: &Url) -> Option<CachedResponse>;
    async fn store(&self, cache: &str, url: &Url, response: CachedResponse);
    async fn remove(&self, cache: &str, url: &Url) -> bool;
    async fn keys(&self, cache: &str) -> Vec<Url>;
    async fn cache_names(&self) -> Vec<String>;
    async fn delete_cache(&self, cache: &str) -> bool;
}

#[async_trait]
pub trait Network: Send + Sync + 'static {
    async fn fetch(&self, request: &CacheRequest) -> Result<CachedResponse, NetworkError>;
}

/// Where a dispatched response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    OfflinePage,
}

#[derive(Debug)]
pub struct Dispatched {
    pub response: CachedResponse,
    pub source: ResponseSource,
    /// `None` for requests the worker does not intercept.
    pub strategy: Option<Strategy>,
    /// Background cache refresh started by stale-while-revalidate.
    pub revalidation: Option<JoinHandle<()>>,
}

impl Dispatched {
    fn new(response: CachedResponse, source: ResponseSource, strategy: Option<Strategy>) -> Self {
        Self {
            response,
            source,
            strategy,
            revalidation: None,
        }
    }
}

pub struct Dispatcher<C, N> {
    cache: Arc<C>,
    network: Arc<N>,
    routes: RouteTable,
    cache_name: String,
    offline_url: Url,
}

impl<C: CacheStore, N: Network> Dispatcher<C, N> {
    pub fn new(
        cache: Arc<C>,
        network: Arc<N>,
        routes: RouteTable,
        cache_name: impl Into<String>,
        offline_url: Url,
    ) -> Self {
        Self {
            cache,
            network,
            routes,
            cache_name: cache_name.into(),
            offline_url,
        }
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Fetch every URL, then store them all; nothing is cached if any fetch fails.
    pub async fn install(&self, urls: &[Url]) -> Result<usize, OfflineError> {
        let mut fetched = Vec::with_capacity(urls.len());
        for url in urls {
            let response = self.network.fetch(&CacheRequest::get(url.clone())).await?;
            if !response.status.is_success() {
                return Err(OfflineError::Install {
                    url: url.to_string(),
                    status: response.status,
                });
            }
            fetched.push((url, response));
        }

        let count = fetched.len();
        for (url, response) in fetched {
            self.cache.store(&self.cache_name, url, response).await;
        }
        info!(
            target = "application::offline",
            cache = %self.cache_name,
            count,
            "precached critical assets"
        );
        Ok(count)
    }

    /// Delete every cache that is not the current version; returns the deleted names.
    pub async fn activate(&self) -> Vec<String> {
        let names = self.cache.cache_names().await;
        let mut deleted = Vec::new();
        for name in stale_cache_names(&names, &self.cache_name) {
            if self.cache.delete_cache(&name).await {
                info!(target = "application::offline", cache = %name, "deleted old cache");
                deleted.push(name);
            }
        }
        deleted
    }

    /// Evict entries whose `Date` header is older than `max_age`.
    ///
    /// A missing or unparseable `Date` counts as the epoch, so such entries are evicted.
    pub async fn sweep(&self, now: OffsetDateTime, max_age: Duration) -> usize {
        let cutoff = now - max_age;
        let mut evicted = 0;
        for url in self.cache.keys(&self.cache_name).await {
            let expired = self
                .cache
                .lookup(&self.cache_name, &url)
                .await
                .and_then(|response| response.date())
                .is_none_or(|date| date < cutoff);
            if expired && self.cache.remove(&self.cache_name, &url).await {
                evicted += 1;
            }
        }
        debug!(target = "application::offline", evicted, "cache sweep finished");
        evicted
    }

    pub async fn handle(&self, request: CacheRequest) -> Result<Dispatched, OfflineError> {
        let Some(strategy) = self.routes.select(&request) else {
            let response = self.network.fetch(&request).await?;
            return Ok(Dispatched::new(response, ResponseSource::Network, None));
        };

        match strategy {
            Strategy::CacheFirst => self.cache_first(&request).await,
            Strategy::NetworkFirst => self.network_first(&request).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
            Strategy::NetworkOnly => {
                let response = self.network.fetch(&request).await?;
                Ok(Dispatched::new(
                    response,
                    ResponseSource::Network,
                    Some(Strategy::NetworkOnly),
                ))
            }
        }
    }

    async fn cache_first(&self, request: &CacheRequest) -> Result<Dispatched, OfflineError> {
        let strategy = Some(Strategy::CacheFirst);
        if let Some(cached) = self.cache.lookup(&self.cache_name, &request.url).await {
            return Ok(Dispatched::new(cached, ResponseSource::Cache, strategy));
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.cache
                        .store(&self.cache_name, &request.url, response.clone())
                        .await;
                }
                Ok(Dispatched::new(response, ResponseSource::Network, strategy))
            }
            Err(err) => {
                warn!(target = "application::offline", error = %err, "cache-first fetch failed");
                match self.cache.lookup(&self.cache_name, &request.url).await {
                    Some(cached) => Ok(Dispatched::new(cached, ResponseSource::Cache, strategy)),
                    None => Err(err.into()),
                }
            }
        }
    }

    async fn network_first(&self, request: &CacheRequest) -> Result<Dispatched, OfflineError> {
        let strategy = Some(Strategy::NetworkFirst);
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.cache
                        .store(&self.cache_name, &request.url, response.clone())
                        .await;
                }
                Ok(Dispatched::new(response, ResponseSource::Network, strategy))
            }
            Err(err) => {
                warn!(
                    target = "application::offline",
                    error = %err,
                    "network-first fetch failed, trying cache"
                );
                match self.cache.lookup(&self.cache_name, &request.url).await {
                    Some(cached) => Ok(Dispatched::new(cached, ResponseSource::Cache, strategy)),
                    None => Err(err.into()),
                }
            }
        }
    }

    async fn stale_while_revalidate(
        &self,
        request: CacheRequest,
    ) -> Result<Dispatched, OfflineError> {
        let strategy = Some(Strategy::StaleWhileRevalidate);

        if let Some(cached) = self.cache.lookup(&self.cache_name, &request.url).await {
            let cache = Arc::clone(&self.cache);
            let network = Arc::clone(&self.network);
            let cache_name = self.cache_name.clone();
            let handle = tokio::spawn(async move {
                match network.fetch(&request).await {
                    Ok(fresh) if fresh.is_cacheable() => {
                        cache.store(&cache_name, &request.url, fresh).await;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(
                            target = "application::offline",
                            error = %err,
                            "background revalidation failed"
                        );
                    }
                }
            });
            let mut dispatched = Dispatched::new(cached, ResponseSource::Cache, strategy);
            dispatched.revalidation = Some(handle);
            return Ok(dispatched);
        }

        match self.network.fetch(&request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.cache
                        .store(&self.cache_name, &request.url, response.clone())
                        .await;
                }
                Ok(Dispatched::new(response, ResponseSource::Network, strategy))
            }
            Err(err) => {
                if request.accepts_html()
                    && let Some(offline) =
                        self.cache.lookup(&self.cache_name, &self.offline_url).await
                {
                    return Ok(Dispatched::new(
                        offline,
                        ResponseSource::OfflinePage,
                        strategy,
                    ));
                }
                Err(err.into())
            }
        }
    }
}

/// Caches left behind by earlier worker versions.
pub fn stale_cache_names(names: &[String], current: &str) -> Vec<String> {
    names
        .iter()
        .filter(|name| name.as_str() != current)
        .cloned()
        .collect()
}
