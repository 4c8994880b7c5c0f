use serde::Serialize;
use time::{Date, format_description::FormatItem, macros::format_description};
use url::Url;

use crate::{
    config::SiteSettings,
    domain::{
        posts::BlogPost,
        seo::{
            OpenGraph, OpenGraphOverrides, OpenGraphType, SeoDescriptor, SeoOverrides,
            TwitterCard, TwitterCardKind, TwitterOverrides,
        },
    },
};

const SCHEMA_CONTEXT: &str = "https://schema.org";
const ISO_DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Which page family an Open Graph image is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OgImageKind {
    #[default]
    Default,
    Blog,
    Profile,
}

#[derive(Clone)]
pub struct SeoService {
    site: SiteSettings,
}

impl SeoService {
    pub fn new(site: SiteSettings) -> Self {
        Self { site }
    }

    /// Document title: the page title through the site template, or the bare site name.
    pub fn page_title(&self, title: Option<&str>) -> String {
        match title.map(str::trim).filter(|title| !title.is_empty()) {
            Some(title) => self.site.title_template.replace("%s", title),
            None => self.site.title.clone(),
        }
    }

    /// Merge per-page overrides onto the site defaults.
    pub fn generate_seo(&self, overrides: SeoOverrides) -> SeoDescriptor {
        let SeoOverrides {
            title,
            description,
            canonical,
            keywords,
            open_graph,
            twitter,
        } = overrides;

        let title = self.page_title(title.as_deref());
        let description = description
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.site.description.clone());
        let default_image = self.og_image(OgImageKind::Default);

        let OpenGraphOverrides {
            title: og_title,
            description: og_description,
            kind,
            image: og_image,
        } = open_graph;
        let open_graph = OpenGraph {
            title: og_title.unwrap_or_else(|| title.clone()),
            description: og_description.unwrap_or_else(|| description.clone()),
            kind: kind.unwrap_or_default(),
            image: Some(
                og_image
                    .map(|image| self.absolute_image(&image))
                    .unwrap_or_else(|| default_image.clone()),
            ),
        };

        let TwitterOverrides {
            card,
            title: twitter_title,
            description: twitter_description,
            image: twitter_image,
        } = twitter;
        let twitter = TwitterCard {
            card: card.unwrap_or_default(),
            title: twitter_title.unwrap_or_else(|| title.clone()),
            description: twitter_description.unwrap_or_else(|| description.clone()),
            image: Some(
                twitter_image
                    .map(|image| self.absolute_image(&image))
                    .unwrap_or(default_image),
            ),
        };

        let keywords = if keywords.is_empty() {
            self.site.keywords.clone()
        } else {
            keywords
        };

        SeoDescriptor {
            title,
            description,
            canonical,
            keywords,
            open_graph,
            twitter,
        }
    }

    pub fn generate_blog_post_seo(&self, post: &BlogPost) -> SeoDescriptor {
        let hero = post
            .frontmatter
            .hero_image
            .as_ref()
            .map(|image| image.src.clone());
        let image = hero.unwrap_or_else(|| self.og_image(OgImageKind::Blog));

        let mut keywords = self.site.keywords.clone();
        for tag in &post.frontmatter.tags {
            if !keywords.iter().any(|existing| existing.eq_ignore_ascii_case(tag)) {
                keywords.push(tag.clone());
            }
        }

        let canonical = post
            .frontmatter
            .canonical
            .clone()
            .or_else(|| post.external_url().map(str::to_string))
            .unwrap_or_else(|| self.site.absolute(&post.path()));

        self.generate_seo(SeoOverrides {
            title: Some(post.title().to_string()),
            description: post.frontmatter.description.clone(),
            canonical: Some(canonical),
            keywords,
            open_graph: OpenGraphOverrides {
                kind: Some(OpenGraphType::Article),
                image: Some(image.clone()),
                ..Default::default()
            },
            twitter: TwitterOverrides {
                card: Some(twitter_card_for(true)),
                image: Some(image),
                ..Default::default()
            },
        })
    }

    /// Open Graph image for a page family. Every family currently shares the site template.
    pub fn og_image(&self, kind: OgImageKind) -> String {
        match kind {
            OgImageKind::Default | OgImageKind::Blog | OgImageKind::Profile => {
                self.absolute_image(&self.site.og_image)
            }
        }
    }

    pub fn website_data(&self) -> StructuredData {
        StructuredData::WebSite {
            name: self.site.title.clone(),
            description: self.site.description.clone(),
            url: self.site.url.to_string(),
            author: PersonRef::new(&self.site.author),
        }
    }

    pub fn article_data(&self, post: &BlogPost) -> StructuredData {
        let published = format_iso(post.pub_date());
        let modified = post
            .frontmatter
            .last_modified
            .map(format_iso)
            .unwrap_or_else(|| published.clone());
        let keywords =
            (!post.frontmatter.tags.is_empty()).then(|| post.frontmatter.tags.join(", "));

        StructuredData::Article {
            headline: post.title().to_string(),
            description: post.frontmatter.description.clone(),
            date_published: published,
            date_modified: modified,
            author: PersonRef::new(&post.author),
            image: post
                .frontmatter
                .hero_image
                .as_ref()
                .map(|image| self.absolute_image(&image.src)),
            keywords,
            url: self.site.absolute(&post.path()),
        }
    }

    pub fn person_data(&self) -> StructuredData {
        StructuredData::Person {
            name: self.site.author.clone(),
            job_title: self.site.job_title.clone(),
            description: self.site.description.clone(),
            url: self.site.url.to_string(),
            same_as: self
                .site
                .social
                .iter()
                .filter(|link| is_valid_og_image(Some(&link.href)))
                .map(|link| link.href.clone())
                .collect(),
        }
    }

    fn absolute_image(&self, src: &str) -> String {
        if is_valid_og_image(Some(src)) {
            src.to_string()
        } else {
            self.site.absolute(src)
        }
    }
}

/// Large cards need an image to show.
pub fn twitter_card_for(has_image: bool) -> TwitterCardKind {
    if has_image {
        TwitterCardKind::SummaryLargeImage
    } else {
        TwitterCardKind::Summary
    }
}

/// Only absolute URLs are usable by social crawlers.
pub fn is_valid_og_image(url: Option<&str>) -> bool {
    url.is_some_and(|url| Url::parse(url).is_ok())
}

fn format_iso(date: Date) -> String {
    date.format(ISO_DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonRef {
    #[serde(rename = "@type")]
    kind: &'static str,
    pub name: String,
}

impl PersonRef {
    fn new(name: &str) -> Self {
        Self {
            kind: "Person",
            name: name.to_string(),
        }
    }
}

/// schema.org entities embedded as `application/ld+json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "@type")]
pub enum StructuredData {
    WebSite {
        name: String,
        description: String,
        url: String,
        author: PersonRef,
    },
    #[serde(rename_all = "camelCase")]
    Article {
        headline: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        date_published: String,
        date_modified: String,
        author: PersonRef,
        #[serde(skip_serializing_if = "Option::is_none")]
        image: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        keywords: Option<String>,
        url: String,
    },
    #[serde(rename_all = "camelCase")]
    Person {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        job_title: Option<String>,
        description: String,
        url: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        same_as: Vec<String>,
    },
}

#[derive(Serialize)]
struct JsonLd<'a> {
    #[serde(rename = "@context")]
    context: &'static str,
    #[serde(flatten)]
    data: &'a StructuredData,
}

impl StructuredData {
    /// JSON safe to inline inside a `<script>` element.
    pub fn to_json_ld(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(&JsonLd {
            context: SCHEMA_CONTEXT,
            data: self,
        })?;
        Ok(json.replace("</", "<\\/"))
    }
}
