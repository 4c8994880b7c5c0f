//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;
#[cfg(test)]
mod tests;

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    path::{Component, Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use time::{Date, format_description::FormatItem, macros::format_description};
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::util::{sanitize::sanitize_email, security::validate_url};

pub use cli::{BuildArgs, BuildOverrides, CliArgs, Command, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "folio";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 4321;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 10;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u64 = 600;
const DEFAULT_CONTENT_DIR: &str = "content";
const DEFAULT_PUBLIC_DIR: &str = "public";
const DEFAULT_OUTPUT_DIR: &str = "dist";
const DEFAULT_SITE_TITLE: &str = "Portfolio";
const DEFAULT_SITE_DESCRIPTION: &str = "Personal website and blog.";
const DEFAULT_SITE_AUTHOR: &str = "Site Author";
const DEFAULT_SITE_URL: &str = "http://localhost:4321";
const DEFAULT_LOCALE: &str = "en_US";
const DEFAULT_LANGUAGE: &str = "en-us";
const DEFAULT_TITLE_TEMPLATE: &str = "%s | {site}";
const DEFAULT_OG_IMAGE: &str = "/og-image-template.svg";
const DEFAULT_THEME_COLOR: &str = "#00ff00";
const DEFAULT_BACKGROUND_COLOR: &str = "#000000";
const DEFAULT_CACHE_PREFIX: &str = "folio";
const DEFAULT_CACHE_VERSION: u32 = 1;
const DEFAULT_OFFLINE_PATH: &str = "/offline/";
pub(crate) const DEFAULT_MAX_PRECACHE_BYTES: u64 = 2 * 1024 * 1024;
const DEFAULT_MAX_ENTRY_AGE_DAYS: u64 = 30;
const DEFAULT_CLEANUP_INTERVAL_HOURS: u64 = 24;

const BUILD_DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub site: SiteSettings,
    pub paths: PathSettings,
    pub build: BuildSettings,
    pub offline: OfflineSettings,
    pub server: ServerSettings,
    pub rate_limit: RateLimitSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub title: String,
    pub description: String,
    pub author: String,
    pub email: Option<String>,
    pub url: Url,
    pub locale: String,
    pub language: String,
    /// `%s` is replaced with the page title.
    pub title_template: String,
    pub keywords: Vec<String>,
    pub job_title: Option<String>,
    pub location: Option<String>,
    pub birth_date: Option<Date>,
    pub twitter_handle: Option<String>,
    pub social: Vec<LinkSettings>,
    pub navigation: Vec<LinkSettings>,
    pub og_image: String,
    pub theme_color: String,
    pub background_color: String,
}

impl SiteSettings {
    /// Host (with port when present) used to tell internal links from external ones.
    pub fn host(&self) -> String {
        match (self.url.host_str(), self.url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        }
    }

    /// Absolute URL for a site-relative path.
    pub fn absolute(&self, path: &str) -> String {
        let base = self.url.as_str().trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LinkSettings {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone)]
pub struct PathSettings {
    pub content_dir: PathBuf,
    pub public_dir: PathBuf,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub include_drafts: bool,
    /// Fixed "today" for reproducible output; the current UTC date when unset.
    pub build_date: Option<Date>,
}

#[derive(Debug, Clone)]
pub struct OfflineSettings {
    pub cache_prefix: String,
    pub cache_version: u32,
    pub offline_path: String,
    pub max_precache_bytes: NonZeroU64,
    pub max_entry_age: Duration,
    pub cleanup_interval: Duration,
}

impl OfflineSettings {
    /// Versioned cache name; bumping the version purges older caches on activation.
    pub fn cache_name(&self) -> String {
        format!("{}-v{}", self.cache_prefix, self.cache_version)
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub window_seconds: NonZeroU32,
    pub max_requests: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix("FOLIO")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("site.keywords")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Build(args) | Command::Check(args) | Command::Routes(args)) => {
            raw.apply_build_overrides(&args.overrides)
        }
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_build_overrides(&BuildOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    site: RawSiteSettings,
    paths: RawPathSettings,
    build: RawBuildSettings,
    offline: RawOfflineSettings,
    server: RawServerSettings,
    rate_limit: RawRateLimitSettings,
    logging: RawLoggingSettings,
}

impl RawSettings {
    fn apply_build_overrides(&mut self, overrides: &BuildOverrides) {
        if let Some(dir) = overrides.content_dir.as_ref() {
            self.paths.content_dir = Some(dir.clone());
        }
        if let Some(dir) = overrides.public_dir.as_ref() {
            self.paths.public_dir = Some(dir.clone());
        }
        if let Some(dir) = overrides.output_dir.as_ref() {
            self.paths.output_dir = Some(dir.clone());
        }
        if let Some(url) = overrides.site_url.as_ref() {
            self.site.url = Some(url.clone());
        }
        if overrides.drafts {
            self.build.include_drafts = Some(true);
        }
        if let Some(date) = overrides.build_date.as_ref() {
            self.build.build_date = Some(date.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        self.apply_build_overrides(&overrides.build);

        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(window) = overrides.rate_limit_window_seconds {
            self.rate_limit.window_seconds = Some(window);
        }
        if let Some(max) = overrides.rate_limit_max_requests {
            self.rate_limit.max_requests = Some(max);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            site,
            paths,
            build,
            offline,
            server,
            rate_limit,
            logging,
        } = raw;

        Ok(Self {
            site: build_site_settings(site)?,
            paths: build_path_settings(paths)?,
            build: build_build_settings(build)?,
            offline: build_offline_settings(offline)?,
            server: build_server_settings(server)?,
            rate_limit: build_rate_limit_settings(rate_limit)?,
            logging: build_logging_settings(logging)?,
        })
    }
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let title = non_empty_or(site.title, DEFAULT_SITE_TITLE);
    let author = non_empty_or(site.author, DEFAULT_SITE_AUTHOR);

    let url_value = site.url.unwrap_or_else(|| DEFAULT_SITE_URL.to_string());
    let url = validate_url(url_value.trim())
        .map_err(|err| LoadError::invalid("site.url", format!("`{url_value}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "site.url",
            "scheme must be http or https",
        ));
    }

    let email = match site.email {
        Some(value) if !value.trim().is_empty() => Some(
            sanitize_email(&value)
                .map_err(|err| LoadError::invalid("site.email", err.to_string()))?,
        ),
        _ => None,
    };

    let title_template = site
        .title_template
        .unwrap_or_else(|| DEFAULT_TITLE_TEMPLATE.replace("{site}", &title));
    if !title_template.contains("%s") {
        return Err(LoadError::invalid(
            "site.title_template",
            "template must contain `%s`",
        ));
    }

    let birth_date = site
        .birth_date
        .map(|value| parse_date("site.birth_date", &value))
        .transpose()?;

    Ok(SiteSettings {
        description: non_empty_or(site.description, DEFAULT_SITE_DESCRIPTION),
        email,
        url,
        locale: non_empty_or(site.locale, DEFAULT_LOCALE),
        language: non_empty_or(site.language, DEFAULT_LANGUAGE),
        title_template,
        keywords: site.keywords.unwrap_or_default(),
        job_title: site.job_title,
        location: site.location,
        birth_date,
        twitter_handle: site.twitter_handle,
        social: site.social.unwrap_or_default(),
        navigation: site.navigation.unwrap_or_else(default_navigation),
        og_image: non_empty_or(site.og_image, DEFAULT_OG_IMAGE),
        theme_color: non_empty_or(site.theme_color, DEFAULT_THEME_COLOR),
        background_color: non_empty_or(site.background_color, DEFAULT_BACKGROUND_COLOR),
        title,
        author,
    })
}

fn default_navigation() -> Vec<LinkSettings> {
    [("BLOG", "/blog/"), ("HOME", "/"), ("RESUME", "/resume/")]
        .into_iter()
        .map(|(label, href)| LinkSettings {
            label: label.to_string(),
            href: href.to_string(),
        })
        .collect()
}

fn build_path_settings(paths: RawPathSettings) -> Result<PathSettings, LoadError> {
    let content_dir = paths
        .content_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTENT_DIR));
    let public_dir = paths
        .public_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PUBLIC_DIR));
    let output_dir = paths
        .output_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    if output_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "paths.output_dir",
            "path must not be empty",
        ));
    }
    let cwd = std::env::current_dir()
        .map_err(|err| LoadError::invalid("paths.output_dir", err.to_string()))?;
    let output = normalize_path(&cwd.join(&output_dir));
    let content = normalize_path(&cwd.join(&content_dir));
    let public = normalize_path(&cwd.join(&public_dir));

    // The build wipes the output directory before writing.
    if cwd.starts_with(&output) || content.starts_with(&output) || public.starts_with(&output) {
        return Err(LoadError::invalid(
            "paths.output_dir",
            "output directory must not contain an input directory or the working directory",
        ));
    }
    if output.starts_with(&public) {
        return Err(LoadError::invalid(
            "paths.output_dir",
            "output directory must not live inside the public directory",
        ));
    }

    Ok(PathSettings {
        content_dir,
        public_dir,
        output_dir,
    })
}

/// Lexically resolve `.` and `..` so prefix comparisons see the real layout.
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

fn build_build_settings(build: RawBuildSettings) -> Result<BuildSettings, LoadError> {
    let build_date = build
        .build_date
        .map(|value| parse_date("build.build_date", &value))
        .transpose()?;

    Ok(BuildSettings {
        include_drafts: build.include_drafts.unwrap_or(false),
        build_date,
    })
}

fn build_offline_settings(offline: RawOfflineSettings) -> Result<OfflineSettings, LoadError> {
    let cache_prefix = non_empty_or(offline.cache_prefix, DEFAULT_CACHE_PREFIX);
    if !cache_prefix
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(LoadError::invalid(
            "offline.cache_prefix",
            "only ASCII letters, digits, `-` and `_` are allowed",
        ));
    }

    let offline_path = non_empty_or(offline.offline_path, DEFAULT_OFFLINE_PATH);
    if !offline_path.starts_with('/') {
        return Err(LoadError::invalid(
            "offline.offline_path",
            "path must be site-relative and start with `/`",
        ));
    }

    let max_precache_bytes = NonZeroU64::new(
        offline
            .max_precache_bytes
            .unwrap_or(DEFAULT_MAX_PRECACHE_BYTES),
    )
    .ok_or_else(|| LoadError::invalid("offline.max_precache_bytes", "must be greater than zero"))?;

    let max_entry_age_days = offline
        .max_entry_age_days
        .unwrap_or(DEFAULT_MAX_ENTRY_AGE_DAYS);
    if max_entry_age_days == 0 {
        return Err(LoadError::invalid(
            "offline.max_entry_age_days",
            "must be greater than zero",
        ));
    }

    let cleanup_interval_hours = offline
        .cleanup_interval_hours
        .unwrap_or(DEFAULT_CLEANUP_INTERVAL_HOURS);
    if cleanup_interval_hours == 0 {
        return Err(LoadError::invalid(
            "offline.cleanup_interval_hours",
            "must be greater than zero",
        ));
    }

    Ok(OfflineSettings {
        cache_prefix,
        cache_version: offline.cache_version.unwrap_or(DEFAULT_CACHE_VERSION),
        offline_path,
        max_precache_bytes,
        max_entry_age: Duration::from_secs(max_entry_age_days * 24 * 60 * 60),
        cleanup_interval: Duration::from_secs(cleanup_interval_hours * 60 * 60),
    })
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_rate_limit_settings(
    rate_limit: RawRateLimitSettings,
) -> Result<RateLimitSettings, LoadError> {
    let window_seconds_val = rate_limit
        .window_seconds
        .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS);
    let window_seconds = non_zero_u32(window_seconds_val, "rate_limit.window_seconds")?;

    let max_requests_val = rate_limit
        .max_requests
        .unwrap_or(DEFAULT_RATE_LIMIT_MAX_REQUESTS);
    let max_requests = non_zero_u32(max_requests_val, "rate_limit.max_requests")?;

    Ok(RateLimitSettings {
        window_seconds,
        max_requests,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    title: Option<String>,
    description: Option<String>,
    author: Option<String>,
    email: Option<String>,
    url: Option<String>,
    locale: Option<String>,
    language: Option<String>,
    title_template: Option<String>,
    keywords: Option<Vec<String>>,
    job_title: Option<String>,
    location: Option<String>,
    birth_date: Option<String>,
    twitter_handle: Option<String>,
    social: Option<Vec<LinkSettings>>,
    navigation: Option<Vec<LinkSettings>>,
    og_image: Option<String>,
    theme_color: Option<String>,
    background_color: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPathSettings {
    content_dir: Option<PathBuf>,
    public_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBuildSettings {
    include_drafts: Option<bool>,
    build_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawOfflineSettings {
    cache_prefix: Option<String>,
    cache_version: Option<u32>,
    offline_path: Option<String>,
    max_precache_bytes: Option<u64>,
    max_entry_age_days: Option<u64>,
    cleanup_interval_hours: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRateLimitSettings {
    window_seconds: Option<u64>,
    max_requests: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_date(key: &'static str, value: &str) -> Result<Date, LoadError> {
    Date::parse(value.trim(), BUILD_DATE_FORMAT)
        .map_err(|err| LoadError::invalid(key, format!("`{value}` is not YYYY-MM-DD: {err}")))
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
