//! RSS 2.0 feed generation.

use time::format_description::well_known::Rfc2822;
use tracing::debug;

use crate::{config::SiteSettings, domain::posts::BlogPost};

/// Renders the feed from already-filtered posts.
#[derive(Clone)]
pub struct SyndicationService {
    site: SiteSettings,
}

impl SyndicationService {
    pub fn new(site: SiteSettings) -> Self {
        Self { site }
    }

    /// Generate RSS 2.0 feed XML.
    ///
    /// `posts` must already exclude drafts; they are emitted newest first.
    /// External posts link to their canonical location elsewhere.
    pub fn rss_feed(&self, posts: &[&BlogPost]) -> String {
        let base = normalize_public_site_url(self.site.url.as_str());

        let mut ordered: Vec<&BlogPost> = posts.to_vec();
        ordered.sort_by(|a, b| b.pub_date().cmp(&a.pub_date()));

        let mut items = String::new();
        for post in ordered {
            let published = post.pub_date().midnight().assume_utc();
            let pub_date = published
                .format(&Rfc2822)
                .unwrap_or_else(|_| published.to_string());
            let link = match post.external_url() {
                Some(external) => external.to_string(),
                None => format!("{base}blog/{}/", post.slug),
            };

            items.push_str("    <item>\n");
            items.push_str(&format!(
                concat!(
                    "      <title>{}</title>\n",
                    "      <link>{}</link>\n",
                    "      <guid isPermaLink=\"true\">{}</guid>\n",
                    "      <pubDate>{}</pubDate>\n",
                ),
                xml_escape(post.title()),
                xml_escape(&link),
                xml_escape(&link),
                pub_date,
            ));
            if let Some(description) = post.frontmatter.description.as_deref() {
                items.push_str(&format!(
                    "      <description>{}</description>\n",
                    xml_escape(description)
                ));
            }
            for tag in &post.frontmatter.tags {
                items.push_str(&format!("      <category>{}</category>\n", xml_escape(tag)));
            }
            items.push_str("    </item>\n");
        }

        debug!(
            target = "application::syndication",
            items = posts.len(),
            "rendered rss feed"
        );

        format!(
            concat!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
                "<rss version=\"2.0\">\n",
                "  <channel>\n",
                "    <title>{}</title>\n",
                "    <description>{}</description>\n",
                "    <link>{}</link>\n",
                "    <language>{}</language>\n",
                "{}  </channel>\n",
                "</rss>\n",
            ),
            xml_escape(&self.site.title),
            xml_escape(&self.site.description),
            base,
            xml_escape(&self.site.language),
            items
        )
    }
}

pub(crate) fn normalize_public_site_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    format!("{trimmed}/")
}

pub(crate) fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
