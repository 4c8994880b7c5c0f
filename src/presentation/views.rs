use crate::application::error::{ErrorReport, HttpError};
use crate::config::SiteSettings;
use crate::domain::seo::SeoDescriptor;
use crate::util::sanitize::link_attributes;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<String, TemplateRenderError> {
    template.render().map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let content = ErrorPageView::not_found();
    let view = LayoutContext::new(chrome, content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct LinkView {
    pub label: String,
    pub href: String,
    pub target: Option<String>,
    pub rel: Option<String>,
}

impl LinkView {
    /// External links open in a new tab without leaking the opener.
    pub fn new(label: impl Into<String>, href: impl Into<String>, site_host: &str) -> Self {
        let href = href.into();
        let attributes = link_attributes(&href, site_host);
        Self {
            label: label.into(),
            href,
            target: attributes.target.map(str::to_string),
            rel: attributes.rel.map(str::to_string),
        }
    }
}

#[derive(Clone)]
pub struct NavigationLinkView {
    pub link: LinkView,
    pub is_active: bool,
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct FooterView {
    pub copy: String,
    pub social: Vec<LinkView>,
    pub email: Option<String>,
}

#[derive(Clone)]
pub struct PageMetaView {
    pub lang: String,
    pub title: String,
    pub description: String,
    pub canonical: Option<String>,
    pub keywords: String,
    pub site_name: String,
    pub locale: String,
    pub og_type: &'static str,
    pub og_title: String,
    pub og_description: String,
    pub og_image: Option<String>,
    pub twitter_card: &'static str,
    pub twitter_title: String,
    pub twitter_description: String,
    pub twitter_image: Option<String>,
    pub twitter_site: Option<String>,
    pub theme_color: String,
    /// Pre-serialised JSON-LD documents, already safe for `<script>`.
    pub json_ld: Vec<String>,
}

impl PageMetaView {
    pub fn from_seo(seo: &SeoDescriptor, site: &SiteSettings, json_ld: Vec<String>) -> Self {
        Self {
            lang: site.language.clone(),
            title: seo.title.clone(),
            description: seo.description.clone(),
            canonical: seo.canonical.clone(),
            keywords: seo.keywords.join(", "),
            site_name: site.title.clone(),
            locale: site.locale.clone(),
            og_type: seo.open_graph.kind.as_str(),
            og_title: seo.open_graph.title.clone(),
            og_description: seo.open_graph.description.clone(),
            og_image: seo.open_graph.image.clone(),
            twitter_card: seo.twitter.card.as_str(),
            twitter_title: seo.twitter.title.clone(),
            twitter_description: seo.twitter.description.clone(),
            twitter_image: seo.twitter.image.clone(),
            twitter_site: site.twitter_handle.clone(),
            theme_color: site.theme_color.clone(),
            json_ld,
        }
    }
}

#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub navigation: Vec<NavigationLinkView>,
    pub footer: FooterView,
    pub meta: PageMetaView,
}

impl LayoutChrome {
    /// Site-wide chrome; `meta` is replaced per page.
    pub fn for_site(site: &SiteSettings, meta: PageMetaView, copyright_year: i32) -> Self {
        let host = site.host();
        Self {
            brand: BrandView {
                title: site.title.clone(),
                href: "/".to_string(),
            },
            navigation: site
                .navigation
                .iter()
                .map(|link| NavigationLinkView {
                    link: LinkView::new(&link.label, &link.href, &host),
                    is_active: false,
                })
                .collect(),
            footer: FooterView {
                copy: format!("© {copyright_year} {}", site.author),
                social: site
                    .social
                    .iter()
                    .map(|link| LinkView::new(&link.label, &link.href, &host))
                    .collect(),
                email: site.email.clone(),
            },
            meta,
        }
    }

    /// Mark the navigation entry owning `path` as current.
    pub fn with_active(mut self, path: &str) -> Self {
        for entry in &mut self.navigation {
            entry.is_active = if entry.link.href == "/" {
                path == "/"
            } else {
                path.starts_with(&entry.link.href)
            };
        }
        self
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub navigation: Vec<NavigationLinkView>,
    pub footer: FooterView,
    pub meta: PageMetaView,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand: chrome.brand,
            navigation: chrome.navigation,
            footer: chrome.footer,
            meta: chrome.meta,
            content,
        }
    }
}

#[derive(Clone)]
pub struct TagBadge {
    pub label: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub title: String,
    pub link: LinkView,
    pub excerpt: Option<String>,
    pub iso_date: String,
    pub published: String,
    pub relative: String,
    pub reading_time: String,
    pub badges: Vec<TagBadge>,
    pub external_site: Option<String>,
    pub is_featured: bool,
}

#[derive(Clone)]
pub struct TagSummary {
    pub label: String,
    pub href: String,
    pub count: usize,
    pub is_active: bool,
}

pub struct CareerSummaryView {
    pub years: u32,
    pub progress: String,
    pub progress_percent: f64,
    pub current_role: Option<String>,
    pub technologies: Vec<String>,
}

pub struct HomeView {
    pub name: String,
    pub job_title: Option<String>,
    pub location: Option<String>,
    pub age: Option<i32>,
    pub description: String,
    pub career: CareerSummaryView,
    pub recent_posts: Vec<PostCard>,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<HomeView>,
}

pub struct BlogIndexView {
    pub heading: String,
    pub posts: Vec<PostCard>,
    pub tags: Vec<TagSummary>,
    pub has_results: bool,
}

#[derive(Template)]
#[template(path = "blog_index.html")]
pub struct BlogIndexTemplate {
    pub view: LayoutContext<BlogIndexView>,
}

#[derive(Clone)]
pub struct TocEntry {
    pub anchor: String,
    pub title: String,
    pub level: u8,
}

pub struct HeroImageView {
    pub src: String,
    pub alt: String,
    pub caption: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

pub struct SeriesEntryView {
    pub title: String,
    pub href: String,
    pub is_current: bool,
}

pub struct PostDetailView {
    pub title: String,
    pub author: String,
    pub published: String,
    pub iso_date: String,
    pub updated: Option<String>,
    pub reading_time: String,
    pub word_count: usize,
    pub difficulty: Option<&'static str>,
    pub series: Option<String>,
    pub series_posts: Vec<SeriesEntryView>,
    pub tags: Vec<TagBadge>,
    pub hero: Option<HeroImageView>,
    pub toc: Vec<TocEntry>,
    pub body_html: String,
    pub has_code_blocks: bool,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<PostDetailView>,
}

pub struct ExperienceTagView {
    pub label: String,
    pub color: &'static str,
}

pub struct TestimonialView {
    pub quote: String,
    pub author: String,
    pub title: String,
    pub company: Option<String>,
    pub date: Option<String>,
    pub stars: String,
}

pub struct ExperienceView {
    pub id: String,
    pub title: String,
    pub company: String,
    pub period: String,
    pub duration: String,
    pub location: &'static str,
    pub is_current: bool,
    pub tags: Vec<ExperienceTagView>,
    pub description: Vec<String>,
    pub technologies: Vec<String>,
    pub achievements: Vec<String>,
    pub website: Option<LinkView>,
    pub logo: Option<String>,
    pub testimonial: Option<TestimonialView>,
}

pub struct ResumeView {
    pub name: String,
    pub job_title: Option<String>,
    pub career: CareerSummaryView,
    pub experiences: Vec<ExperienceView>,
}

#[derive(Template)]
#[template(path = "resume.html")]
pub struct ResumeTemplate {
    pub view: LayoutContext<ResumeView>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub primary_action: Option<ErrorAction>,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist. \
                      Try returning to the homepage to continue exploring."
                .to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }

    pub fn offline() -> Self {
        Self {
            title: "You are offline".to_string(),
            message: "This page has not been saved for offline reading yet. \
                      Reconnect and try again; pages you have already visited stay available."
                .to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Back to home".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

pub fn build_tag_badges<'a, T>(tags: T) -> Vec<TagBadge>
where
    T: IntoIterator<Item = &'a String>,
{
    tags.into_iter()
        .map(|tag| TagBadge {
            label: format!("#{tag}"),
            href: tag_path(tag),
        })
        .collect()
}

/// Listing page for one tag.
pub fn tag_path(tag: &str) -> String {
    format!("/blog/tags/{}/", slug::slugify(tag))
}

pub fn rating_stars(rating: u8) -> String {
    let filled = usize::from(rating.min(5));
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}
