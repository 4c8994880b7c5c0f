use std::fmt;

use axum::http::{HeaderMap, Method, header::ACCEPT};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use url::Url;

static NETWORK_FIRST_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[r"/rss\.xml$", r"/sitemap.*\.xml$", r"/api/"])
});

static CACHE_FIRST_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"/assets/",
        r"/images/",
        r"\.(?:css|js|woff2|woff|ttf|eot|svg|png|jpg|jpeg|webp|avif|ico)$",
    ])
});

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| Regex::new(pattern).expect("valid route pattern"))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Fresh content preferred; the cache covers outages.
    NetworkFirst,
    /// Immutable assets served from cache when present.
    CacheFirst,
    /// Cached copy returned immediately while a refresh runs.
    StaleWhileRevalidate,
    NetworkOnly,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::NetworkFirst => "network-first",
            Strategy::CacheFirst => "cache-first",
            Strategy::StaleWhileRevalidate => "stale-while-revalidate",
            Strategy::NetworkOnly => "network-only",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request as seen by the worker's fetch handler.
#[derive(Debug, Clone)]
pub struct CacheRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

impl CacheRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
        }
    }

    /// A browser navigation: GET with `Accept: text/html`.
    pub fn navigation(url: Url) -> Self {
        let mut request = Self::get(url);
        request.headers.insert(
            ACCEPT,
            axum::http::HeaderValue::from_static(
                "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
            ),
        );
        request
    }

    pub fn accepts_html(&self) -> bool {
        self.headers
            .get(ACCEPT)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|accept| accept.contains("text/html"))
    }
}

#[derive(Debug, Clone)]
pub enum RouteMatcher {
    /// Regular expression tested against the URL path.
    Path(Regex),
    AcceptsHtml,
}

impl RouteMatcher {
    pub fn matches(&self, request: &CacheRequest) -> bool {
        match self {
            RouteMatcher::Path(pattern) => pattern.is_match(request.url.path()),
            RouteMatcher::AcceptsHtml => request.accepts_html(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteRule {
    pub matcher: RouteMatcher,
    pub strategy: Strategy,
}

/// Serialised form of a rule consumed by the generated worker script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptRule {
    pub strategy: Strategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub accepts_html: bool,
}

/// Ordered rules; the first match decides, unmatched requests go to the network.
#[derive(Debug, Clone)]
pub struct RouteTable {
    origin: url::Origin,
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new(site: &Url, rules: Vec<RouteRule>) -> Self {
        Self {
            origin: site.origin(),
            rules,
        }
    }

    /// Feeds and APIs first, then static assets, then HTML navigations.
    pub fn with_default_rules(site: &Url) -> Self {
        let mut rules = Vec::new();
        for pattern in NETWORK_FIRST_PATTERNS.iter() {
            rules.push(RouteRule {
                matcher: RouteMatcher::Path(pattern.clone()),
                strategy: Strategy::NetworkFirst,
            });
        }
        for pattern in CACHE_FIRST_PATTERNS.iter() {
            rules.push(RouteRule {
                matcher: RouteMatcher::Path(pattern.clone()),
                strategy: Strategy::CacheFirst,
            });
        }
        rules.push(RouteRule {
            matcher: RouteMatcher::AcceptsHtml,
            strategy: Strategy::StaleWhileRevalidate,
        });
        Self::new(site, rules)
    }

    /// `None` when the worker must not intercept the request at all.
    pub fn select(&self, request: &CacheRequest) -> Option<Strategy> {
        if request.method != Method::GET || request.url.origin() != self.origin {
            return None;
        }

        let strategy = self
            .rules
            .iter()
            .find(|rule| rule.matcher.matches(request))
            .map(|rule| rule.strategy)
            .unwrap_or(Strategy::NetworkOnly);
        Some(strategy)
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn script_rules(&self) -> Vec<ScriptRule> {
        self.rules
            .iter()
            .map(|rule| match &rule.matcher {
                RouteMatcher::Path(pattern) => ScriptRule {
                    strategy: rule.strategy,
                    pattern: Some(pattern.as_str().to_string()),
                    accepts_html: false,
                },
                RouteMatcher::AcceptsHtml => ScriptRule {
                    strategy: rule.strategy,
                    pattern: None,
                    accepts_html: true,
                },
            })
            .collect()
    }
}
