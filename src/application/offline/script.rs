//! Renders `sw.js` with the cache version, route table and precache manifest baked in.

use std::time::Duration;

use askama::Template;
use thiserror::Error;

use super::{precache::PrecacheEntry, strategy::RouteTable};

pub const MANIFEST_PATH: &str = "/manifest.json";

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to serialise worker data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to render worker template: {0}")]
    Template(#[from] askama::Error),
}

pub struct ServiceWorkerConfig<'a> {
    pub cache_name: &'a str,
    pub offline_path: &'a str,
    pub precache: &'a [PrecacheEntry],
    pub routes: &'a RouteTable,
    pub max_entry_age: Duration,
    pub cleanup_interval: Duration,
}

impl ServiceWorkerConfig<'_> {
    /// Fetched on install before the worker takes control.
    pub fn critical_assets(&self) -> Vec<String> {
        let mut assets = vec!["/".to_string(), self.offline_path.to_string()];
        if !assets.iter().any(|asset| asset == MANIFEST_PATH) {
            assets.push(MANIFEST_PATH.to_string());
        }
        assets
    }
}

#[derive(Template)]
#[template(path = "sw.js", escape = "none")]
struct ServiceWorkerTemplate {
    cache_name: String,
    offline_url: String,
    critical_assets: String,
    precache_manifest: String,
    routes: String,
    max_entry_age_ms: u128,
    cleanup_interval_ms: u128,
}

/// Values are embedded as JSON literals so they are valid JavaScript.
pub fn render_service_worker(config: &ServiceWorkerConfig<'_>) -> Result<String, ScriptError> {
    let template = ServiceWorkerTemplate {
        cache_name: serde_json::to_string(config.cache_name)?,
        offline_url: serde_json::to_string(config.offline_path)?,
        critical_assets: serde_json::to_string(&config.critical_assets())?,
        precache_manifest: serde_json::to_string(config.precache)?,
        routes: serde_json::to_string(&config.routes.script_rules())?,
        max_entry_age_ms: config.max_entry_age.as_millis(),
        cleanup_interval_ms: config.cleanup_interval.as_millis(),
    };
    Ok(template.render()?)
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;

    #[test]
    fn embeds_version_routes_and_manifest() {
        let routes = RouteTable::with_default_rules(&Url::parse("https://jane.dev").expect("url"));
        let precache = vec![PrecacheEntry {
            url: "/assets/site.css".to_string(),
            revision: "abc123".to_string(),
        }];
        let script = render_service_worker(&ServiceWorkerConfig {
            cache_name: "folio-v3",
            offline_path: "/offline/",
            precache: &precache,
            routes: &routes,
            max_entry_age: Duration::from_secs(30 * 24 * 60 * 60),
            cleanup_interval: Duration::from_secs(24 * 60 * 60),
        })
        .expect("render");

        assert!(script.contains(r#"const CACHE_NAME = "folio-v3";"#));
        assert!(script.contains(r#"const OFFLINE_URL = "/offline/";"#));
        assert!(script.contains(r#"const CRITICAL_ASSETS = ["/","/offline/","/manifest.json"];"#));
        assert!(script.contains(r#"{"url":"/assets/site.css","revision":"abc123"}"#));
        assert!(script.contains(r#""pattern":"/rss\\.xml$""#));
        assert!(script.contains("const MAX_ENTRY_AGE_MS = 2592000000;"));
        assert!(script.contains("addEventListener('activate'"));
    }
}
