//! Sanitisation for user-facing strings that end up in generated markup.
//!
//! Every helper either normalises its input or falls back to a safe value;
//! only [`sanitize_email`] reports failures, since there is no meaningful
//! fallback address.

use once_cell::sync::Lazy;
use regex::Regex;
use slug::slugify;
use thiserror::Error;
use url::Url;

use super::security::validate_email;

/// Placeholder href used when a link target cannot be trusted.
pub const FALLBACK_URL: &str = "#";

const ALLOWED_SCHEMES: [&str; 2] = ["http", "https"];

pub(crate) static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));
static ANGLE_BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[<>]").expect("valid pattern"));
static JAVASCRIPT_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)javascript:").expect("valid pattern"));
static EVENT_HANDLER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)on\w+=").expect("valid pattern"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid email format")]
    InvalidEmail,
    #[error("Invalid URL format")]
    InvalidUrl,
    #[error("Invalid slug")]
    InvalidSlug,
    #[error("{field} is required")]
    Required { field: &'static str },
}

/// Keep only absolute http(s) URLs, normalised by the URL parser.
pub fn sanitize_url(input: &str) -> String {
    match Url::parse(input.trim()) {
        Ok(url) if ALLOWED_SCHEMES.contains(&url.scheme()) => url.to_string(),
        _ => FALLBACK_URL.to_string(),
    }
}

/// Strip markup delimiters, `javascript:` schemes and inline event handlers.
pub fn sanitize_text(input: &str) -> String {
    let without_brackets = ANGLE_BRACKETS.replace_all(input, "");
    let without_scheme = JAVASCRIPT_SCHEME.replace_all(&without_brackets, "");
    EVENT_HANDLER
        .replace_all(&without_scheme, "")
        .trim()
        .to_string()
}

pub fn sanitize_email(input: &str) -> Result<String, ValidationError> {
    let candidate = input.trim();
    validate_email(candidate)?;
    Ok(candidate.to_lowercase())
}

/// Lowercase ASCII slug made of `[a-z0-9-]`, without leading, trailing or repeated hyphens.
///
/// Non-ASCII letters are transliterated rather than dropped. Applying the
/// function to its own output returns the same string.
pub fn sanitize_slug(input: &str) -> String {
    slugify(input)
}

/// Whether `url` points to a host other than `site_host`.
///
/// Relative references and unparsable input are treated as internal.
pub fn is_external_url(url: &str, site_host: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => host_with_port(host, parsed.port()) != site_host,
            None => false,
        },
        Err(_) => false,
    }
}

fn host_with_port(host: &str, port: Option<u16>) -> String {
    match port {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// Anchor attributes applied to outbound links.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkAttributes {
    pub target: Option<&'static str>,
    pub rel: Option<&'static str>,
}

pub fn link_attributes(url: &str, site_host: &str) -> LinkAttributes {
    if is_external_url(url, site_host) {
        LinkAttributes {
            target: Some("_blank"),
            rel: Some("noopener noreferrer"),
        }
    } else {
        LinkAttributes::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = "clauzier.dev";

    #[test]
    fn url_keeps_http_and_https() {
        assert_eq!(
            sanitize_url("https://example.com/path?query=value"),
            "https://example.com/path?query=value"
        );
        assert_eq!(sanitize_url("http://example.com"), "http://example.com/");
        assert_eq!(
            sanitize_url("https://example.com/page#section"),
            "https://example.com/page#section"
        );
    }

    #[test]
    fn url_rejects_other_schemes() {
        assert_eq!(sanitize_url("javascript:alert(\"XSS\")"), FALLBACK_URL);
        assert_eq!(
            sanitize_url("data:text/html,<script>alert(\"XSS\")</script>"),
            FALLBACK_URL
        );
        assert_eq!(sanitize_url("file:///etc/passwd"), FALLBACK_URL);
        assert_eq!(sanitize_url("not a valid url"), FALLBACK_URL);
        assert_eq!(sanitize_url("/relative/path"), FALLBACK_URL);
    }

    #[test]
    fn text_strips_markup_and_handlers() {
        let cleaned = sanitize_text("Hello <script>alert(\"XSS\")</script> World");
        assert_eq!(cleaned, "Hello scriptalert(\"XSS\")/script World");

        assert!(!sanitize_text("Click JavaScript:alert(1)").to_lowercase().contains("javascript:"));
        assert_eq!(sanitize_text("onclick=alert(1) onerror=alert(2)"), "alert(1) alert(2)");
        assert_eq!(sanitize_text("  Hello World  "), "Hello World");
        assert_eq!(sanitize_text(""), "");
        assert_eq!(
            sanitize_text("Safe text with numbers 123 and symbols !@#$%"),
            "Safe text with numbers 123 and symbols !@#$%"
        );
    }

    #[test]
    fn email_is_lowercased_and_trimmed() {
        assert_eq!(
            sanitize_email("User@Example.COM").expect("valid"),
            "user@example.com"
        );
        assert_eq!(
            sanitize_email("  user+tag@mail.example.com ").expect("valid"),
            "user+tag@mail.example.com"
        );
    }

    #[test]
    fn email_rejects_malformed_input() {
        for input in ["not-an-email", "missing@domain", "@example.com", "user@", ""] {
            assert_eq!(
                sanitize_email(input),
                Err(ValidationError::InvalidEmail),
                "{input}"
            );
        }
        assert_eq!(
            ValidationError::InvalidEmail.to_string(),
            "Invalid email format"
        );
    }

    #[test]
    fn email_longer_than_the_address_limit_is_rejected() {
        let local = "a".repeat(250);
        assert_eq!(
            sanitize_email(&format!("{local}@example.com")),
            Err(ValidationError::InvalidEmail)
        );
    }

    #[test]
    fn slug_normalizes_and_is_idempotent() {
        let cases = [
            ("MyBlogPost", "myblogpost"),
            ("My Blog Post", "my-blog-post"),
            ("My Blog! Post?", "my-blog-post"),
            ("my---blog--post", "my-blog-post"),
            ("-my-blog-post-", "my-blog-post"),
            ("post-123-title", "post-123-title"),
            ("café-résumé", "cafe-resume"),
        ];
        for (input, expected) in cases {
            let once = sanitize_slug(input);
            assert_eq!(once, expected, "{input}");
            assert_eq!(sanitize_slug(&once), once, "idempotent for {input}");
        }
    }

    #[test]
    fn external_urls_are_detected_by_host() {
        assert!(is_external_url("https://external.com/page", HOST));
        assert!(is_external_url("http://external.com", HOST));
        assert!(is_external_url("https://blog.clauzier.dev", HOST));
        assert!(!is_external_url("https://clauzier.dev/blog", HOST));
        assert!(!is_external_url("/blog/post", HOST));
        assert!(!is_external_url("not a url", HOST));
        assert!(is_external_url("http://localhost:4321/", "localhost:3000"));
    }

    #[test]
    fn link_attributes_only_for_external_targets() {
        assert_eq!(
            link_attributes("https://external.com", HOST),
            LinkAttributes {
                target: Some("_blank"),
                rel: Some("noopener noreferrer"),
            }
        );
        assert_eq!(
            link_attributes("https://clauzier.dev/blog", HOST),
            LinkAttributes::default()
        );
        assert_eq!(link_attributes("#section", HOST), LinkAttributes::default());
    }
}
