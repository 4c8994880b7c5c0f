use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenGraphType {
    #[default]
    Website,
    Article,
}

impl OpenGraphType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpenGraphType::Website => "website",
            OpenGraphType::Article => "article",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TwitterCardKind {
    Summary,
    #[default]
    SummaryLargeImage,
}

impl TwitterCardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TwitterCardKind::Summary => "summary",
            TwitterCardKind::SummaryLargeImage => "summary_large_image",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenGraph {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: OpenGraphType,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TwitterCard {
    pub card: TwitterCardKind,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
}

/// Fully resolved metadata for one rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeoDescriptor {
    pub title: String,
    pub description: String,
    pub canonical: Option<String>,
    pub keywords: Vec<String>,
    pub open_graph: OpenGraph,
    pub twitter: TwitterCard,
}

#[derive(Debug, Clone, Default)]
pub struct OpenGraphOverrides {
    pub title: Option<String>,
    pub description: Option<String>,
    pub kind: Option<OpenGraphType>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TwitterOverrides {
    pub card: Option<TwitterCardKind>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

/// Per-page values; anything left unset falls back to site defaults.
#[derive(Debug, Clone, Default)]
pub struct SeoOverrides {
    pub title: Option<String>,
    pub description: Option<String>,
    pub canonical: Option<String>,
    pub keywords: Vec<String>,
    pub open_graph: OpenGraphOverrides,
    pub twitter: TwitterOverrides,
}
