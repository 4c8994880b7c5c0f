use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::sanitize::{EMAIL_PATTERN, ValidationError};

pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MAX_SLUG_LENGTH: usize = 100;
pub const DEFAULT_TEXT_LIMIT: usize = 1000;

static XSS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?is)<script.*?>.*?</script>",
        r"(?i)javascript:",
        r"(?i)on\w+\s*=",
        r"(?is)<iframe.*?>",
        r"(?is)<object.*?>",
        r"(?is)<embed.*?>",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("valid xss pattern"))
    .collect()
});

static SLUG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]+$").expect("valid slug pattern"));

/// Whether `content` is free of script tags, embeds, `javascript:` URLs and inline handlers.
pub fn validate_content(content: &str) -> bool {
    !XSS_PATTERNS.iter().any(|pattern| pattern.is_match(content))
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.len() <= MAX_EMAIL_LENGTH && EMAIL_PATTERN.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail)
    }
}

pub fn validate_url(url: &str) -> Result<Url, ValidationError> {
    Url::parse(url).map_err(|_| ValidationError::InvalidUrl)
}

pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if slug.len() <= MAX_SLUG_LENGTH && SLUG_PATTERN.is_match(slug) {
        Ok(())
    } else {
        Err(ValidationError::InvalidSlug)
    }
}

pub fn validate_required(value: Option<&str>, field: &'static str) -> Result<(), ValidationError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(()),
        _ => Err(ValidationError::Required { field }),
    }
}

/// Text fits within `max_chars` characters and passes [`validate_content`].
pub fn validate_text(text: &str, max_chars: usize) -> bool {
    text.chars().count() <= max_chars && validate_content(text)
}

/// Headers attached to every response served for the generated site.
pub fn security_headers() -> [(&'static str, &'static str); 5] {
    [
        ("x-content-type-options", "nosniff"),
        ("x-frame-options", "DENY"),
        ("x-xss-protection", "1; mode=block"),
        ("referrer-policy", "strict-origin-when-cross-origin"),
        (
            "permissions-policy",
            "camera=(), microphone=(), geolocation=()",
        ),
    ]
}

/// Sliding-window limiter keyed by an arbitrary client identifier.
///
/// Instances are cheap to clone and share their buckets.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
        }
    }

    /// Record an attempt for `key`, returning whether it is within the limit.
    pub fn is_allowed(&self, key: &str) -> bool {
        self.is_allowed_at(key, Instant::now())
    }

    pub(crate) fn is_allowed_at(&self, key: &str, now: Instant) -> bool {
        let window = self.window;
        let mut entry = self.buckets.entry(key.to_string()).or_default();
        entry.retain(|instant| now.saturating_duration_since(*instant) < window);

        if entry.len() >= self.max_requests as usize {
            return false;
        }

        entry.push(now);
        true
    }

    pub fn reset(&self, key: &str) {
        self.buckets.remove(key);
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_with_scripts_or_handlers_is_rejected() {
        assert!(validate_content("Plain words and a <strong>tag</strong>"));
        assert!(!validate_content("<script>alert(1)</script>"));
        assert!(!validate_content("<SCRIPT src=x>\n</SCRIPT>"));
        assert!(!validate_content("<a href=\"javascript:void(0)\">x</a>"));
        assert!(!validate_content("<img src=x onerror = alert(1)>"));
        assert!(!validate_content("<iframe src=\"https://evil\">"));
        assert!(!validate_content("<object data=x>"));
        assert!(!validate_content("<embed src=x>"));
    }

    #[test]
    fn input_validators() {
        assert!(validate_email("user@example.com").is_ok());
        let long_local = "a".repeat(250);
        assert_eq!(
            validate_email(&format!("{long_local}@example.com")),
            Err(ValidationError::InvalidEmail)
        );

        assert!(validate_url("https://example.com").is_ok());
        assert_eq!(validate_url("nope"), Err(ValidationError::InvalidUrl));

        assert!(validate_slug("hello-world-2").is_ok());
        assert!(validate_slug("Hello World").is_err());
        assert!(validate_slug(&"a".repeat(101)).is_err());

        assert!(validate_required(Some("x"), "title").is_ok());
        assert_eq!(
            validate_required(Some("  "), "title")
                .expect_err("blank")
                .to_string(),
            "title is required"
        );

        assert!(validate_text("short", DEFAULT_TEXT_LIMIT));
        assert!(!validate_text("toolong", 3));
        assert!(!validate_text("<script>x</script>", DEFAULT_TEXT_LIMIT));
    }

    #[test]
    fn limiter_blocks_after_max_attempts_within_window() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);
        let start = Instant::now();

        assert!(limiter.is_allowed_at("client", start));
        assert!(limiter.is_allowed_at("client", start + Duration::from_secs(1)));
        assert!(!limiter.is_allowed_at("client", start + Duration::from_secs(2)));
        assert!(limiter.is_allowed_at("other", start + Duration::from_secs(2)));

        assert!(limiter.is_allowed_at("client", start + Duration::from_secs(61)));
    }

    #[test]
    fn limiter_reset_clears_history() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);
        assert!(limiter.is_allowed("client"));
        assert!(!limiter.is_allowed("client"));
        limiter.reset("client");
        assert!(limiter.is_allowed("client"));
    }
}
