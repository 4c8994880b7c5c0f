use time::{Date, format_description::FormatItem, macros::format_description};

use crate::{
    application::syndication::{normalize_public_site_url, xml_escape},
    config::SiteSettings,
};

const LASTMOD_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// One local page listed in the sitemap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    /// Site-relative path, starting with `/`.
    pub path: String,
    pub last_modified: Option<Date>,
}

impl SitemapEntry {
    pub fn new(path: impl Into<String>, last_modified: Option<Date>) -> Self {
        Self {
            path: path.into(),
            last_modified,
        }
    }
}

#[derive(Clone)]
pub struct SitemapService {
    site: SiteSettings,
}

impl SitemapService {
    pub fn new(site: SiteSettings) -> Self {
        Self { site }
    }

    /// Generate sitemap.xml content. Entries keep the order they were given.
    pub fn sitemap_xml(&self, entries: &[SitemapEntry]) -> String {
        let base = normalize_public_site_url(self.site.url.as_str());
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
        );
        for entry in entries {
            xml.push_str(&sitemap_entry(&base, entry));
        }
        xml.push_str("</urlset>\n");
        xml
    }

    /// Generate robots.txt content.
    pub fn robots_txt(&self) -> String {
        let base = normalize_public_site_url(self.site.url.as_str());
        let sitemap_url = format!("{base}sitemap.xml");
        format!("User-agent: *\nAllow: /\nSitemap: {sitemap_url}\n")
    }
}

fn sitemap_entry(base: &str, entry: &SitemapEntry) -> String {
    let loc = format!("{}{}", base, entry.path.trim_start_matches('/'));
    let mut xml = format!("  <url>\n    <loc>{}</loc>\n", xml_escape(&loc));
    if let Some(lastmod) = entry
        .last_modified
        .and_then(|date| date.format(LASTMOD_FORMAT).ok())
    {
        xml.push_str(&format!("    <lastmod>{lastmod}</lastmod>\n"));
    }
    xml.push_str("  </url>\n");
    xml
}
