//! Offline support: request routing, strategy execution and the generated service worker.

pub mod dispatcher;
pub mod memory;
pub mod precache;
pub mod script;
pub mod strategy;

use std::sync::Arc;

use tracing::info;
use url::Url;

pub use dispatcher::{
    CacheStore, CachedResponse, Dispatched, Dispatcher, Network, NetworkError, OfflineError,
    ResponseSource, stale_cache_names,
};
pub use memory::MemoryCache;
pub use precache::{PrecacheEntry, PrecacheError, PrecacheOptions, build_manifest};
pub use script::{ScriptError, ServiceWorkerConfig, render_service_worker};
pub use strategy::{CacheRequest, RouteTable, Strategy};

/// Result of replaying the worker's install step against a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub cache_name: String,
    pub cached: usize,
}

/// Replay the install step against `network`, failing like `cache.addAll` would
/// when any critical or precached URL is missing.
pub async fn verify_install<N: Network>(
    network: Arc<N>,
    config: &ServiceWorkerConfig<'_>,
    site_url: &Url,
) -> Result<InstallReport, OfflineError> {
    let mut paths = config.critical_assets();
    for entry in config.precache {
        if !paths.contains(&entry.url) {
            paths.push(entry.url.clone());
        }
    }

    let urls: Vec<Url> = paths
        .iter()
        .filter_map(|path| site_url.join(path).ok())
        .collect();
    let offline_url = site_url
        .join(config.offline_path)
        .unwrap_or_else(|_| site_url.clone());

    let dispatcher = Dispatcher::new(
        Arc::new(MemoryCache::new()),
        network,
        config.routes.clone(),
        config.cache_name,
        offline_url,
    );
    let cached = dispatcher.install(&urls).await?;
    info!(
        target = "application::offline",
        cache = config.cache_name,
        cached,
        "service worker install verified"
    );

    Ok(InstallReport {
        cache_name: config.cache_name.to_string(),
        cached,
    })
}
