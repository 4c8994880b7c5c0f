use serde::Serialize;

use crate::config::SiteSettings;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestIcon {
    pub src: String,
    pub sizes: String,
    #[serde(rename = "type")]
    pub mime: String,
    pub purpose: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebAppManifest {
    pub name: String,
    pub short_name: String,
    pub description: String,
    pub lang: String,
    pub start_url: String,
    pub scope: String,
    pub display: String,
    pub theme_color: String,
    pub background_color: String,
    pub icons: Vec<ManifestIcon>,
}

/// Characters browsers show under a home-screen icon.
const SHORT_NAME_LIMIT: usize = 12;

impl WebAppManifest {
    pub fn for_site(site: &SiteSettings, icon: &str) -> Self {
        Self {
            name: site.title.clone(),
            short_name: short_name(&site.title),
            description: site.description.clone(),
            lang: site.language.clone(),
            start_url: "/".to_string(),
            scope: "/".to_string(),
            display: "standalone".to_string(),
            theme_color: site.theme_color.clone(),
            background_color: site.background_color.clone(),
            icons: vec![ManifestIcon {
                src: icon.to_string(),
                sizes: "any".to_string(),
                mime: mime_guess::from_path(icon)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string(),
                purpose: "any maskable".to_string(),
            }],
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn short_name(title: &str) -> String {
    if title.chars().count() <= SHORT_NAME_LIMIT {
        return title.to_string();
    }
    title
        .split_whitespace()
        .next()
        .filter(|word| word.chars().count() <= SHORT_NAME_LIMIT)
        .map(str::to_string)
        .unwrap_or_else(|| title.chars().take(SHORT_NAME_LIMIT).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_prefers_first_word() {
        assert_eq!(short_name("Jane"), "Jane");
        assert_eq!(short_name("Antonin CLAUZIER"), "Antonin");
        assert_eq!(short_name("Supercalifragilistic"), "Supercalifra");
    }
}
