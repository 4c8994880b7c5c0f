//! Blog posts: the frontmatter schema and collection helpers.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize};
use time::{
    Date, OffsetDateTime, format_description::FormatItem, format_description::well_known::Rfc3339,
    macros::format_description,
};
use url::Url;

use super::error::DomainError;

const ISO_DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalLink {
    pub url: String,
    pub site: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

/// Metadata block at the top of every post file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Frontmatter {
    pub title: String,
    #[serde(deserialize_with = "deserialize_date")]
    pub pub_date: Date,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub series: Option<String>,
    #[serde(default)]
    pub series_order: Option<u32>,
    #[serde(default)]
    pub hero_image: Option<ImageRef>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default)]
    pub external: Option<ExternalLink>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub featured: bool,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub last_modified: Option<Date>,
    /// Minutes; overrides the estimate computed from the body.
    #[serde(default)]
    pub reading_time: Option<u32>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub canonical: Option<String>,
}

impl Frontmatter {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::missing("title"));
        }
        if let Some(external) = &self.external {
            require_web_url("external.url", &external.url)?;
            if external.site.trim().is_empty() {
                return Err(DomainError::missing("external.site"));
            }
        }
        if let Some(canonical) = &self.canonical {
            require_web_url("canonical", canonical)?;
        }
        for image in self.hero_image.iter().chain(self.images.iter()) {
            if image.src.trim().is_empty() {
                return Err(DomainError::missing("image.src"));
            }
        }
        if self
            .last_modified
            .is_some_and(|modified| modified < self.pub_date)
        {
            return Err(DomainError::validation(
                "lastModified precedes pubDate".to_string(),
            ));
        }
        Ok(())
    }
}

fn require_web_url(field: &str, value: &str) -> Result<(), DomainError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(DomainError::validation(format!(
            "{field} must be an absolute http(s) URL, got `{value}`"
        ))),
    }
}

/// A validated post ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlogPost {
    pub slug: String,
    pub author: String,
    pub frontmatter: Frontmatter,
    /// Markdown body without the frontmatter block.
    pub body: String,
}

impl BlogPost {
    pub fn title(&self) -> &str {
        &self.frontmatter.title
    }

    pub fn pub_date(&self) -> Date {
        self.frontmatter.pub_date
    }

    pub fn is_draft(&self) -> bool {
        self.frontmatter.draft
    }

    pub fn external_url(&self) -> Option<&str> {
        self.frontmatter
            .external
            .as_ref()
            .map(|external| external.url.as_str())
    }

    /// Site-relative path of the post page.
    pub fn path(&self) -> String {
        format!("/blog/{}/", self.slug)
    }

    /// Where listings and feeds should send readers.
    pub fn link(&self) -> String {
        self.external_url()
            .map(str::to_string)
            .unwrap_or_else(|| self.path())
    }
}

/// Split a `---` delimited YAML block from the markdown body.
///
/// Returns an empty frontmatter string when the document has none.
pub fn split_frontmatter(content: &str) -> (&str, &str) {
    let trimmed = content.trim_start_matches('\u{feff}').trim_start();
    let Some(after) = trimmed.strip_prefix("---") else {
        return ("", content);
    };
    match after.find("\n---") {
        Some(end) => {
            let body = &after[end + 4..];
            let body = body
                .strip_prefix("\r\n")
                .or_else(|| body.strip_prefix('\n'))
                .unwrap_or(body);
            (after[..end].trim(), body)
        }
        None => ("", content),
    }
}

/// Published posts (drafts only when requested), newest first, ties broken by slug.
pub fn published(posts: &[BlogPost], include_drafts: bool) -> Vec<&BlogPost> {
    let mut visible: Vec<&BlogPost> = posts
        .iter()
        .filter(|post| include_drafts || !post.is_draft())
        .collect();
    visible.sort_by(|a, b| {
        b.pub_date()
            .cmp(&a.pub_date())
            .then_with(|| a.slug.cmp(&b.slug))
    });
    visible
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCount {
    /// First spelling seen for the slug.
    pub label: String,
    pub count: usize,
}

/// Posts per tag, keyed by the tag's URL slug so `Rust` and `rust` share a listing.
pub fn tag_counts<'a>(
    posts: impl IntoIterator<Item = &'a BlogPost>,
) -> BTreeMap<String, TagCount> {
    let mut counts: BTreeMap<String, TagCount> = BTreeMap::new();
    for post in posts {
        let mut seen = BTreeSet::new();
        for tag in &post.frontmatter.tags {
            let key = slug::slugify(tag);
            if key.is_empty() || !seen.insert(key.clone()) {
                continue;
            }
            counts
                .entry(key)
                .or_insert_with(|| TagCount {
                    label: tag.clone(),
                    count: 0,
                })
                .count += 1;
        }
    }
    counts
}

fn parse_date(value: &str) -> Option<Date> {
    let value = value.trim();
    Date::parse(value, ISO_DATE_FORMAT)
        .ok()
        .or_else(|| {
            OffsetDateTime::parse(value, &Rfc3339)
                .ok()
                .map(|datetime| datetime.date())
        })
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<Date, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!(
            "invalid date `{raw}`, expected YYYY-MM-DD or RFC 3339"
        ))
    })
}

fn deserialize_optional_date<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_date(&raw).map(Some).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid date `{raw}`, expected YYYY-MM-DD or RFC 3339"
            ))
        }),
        None => Ok(None),
    }
}
