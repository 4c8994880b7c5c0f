//! Static site build: loads content, renders every page and emits the offline worker.

mod output;
mod pages;

use std::{path::PathBuf, sync::Arc};

use time::{Date, OffsetDateTime};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

pub use output::{OutputDir, page_file};

use crate::{
    application::{
        content::{ContentRepository, SiteContent},
        error::AppError,
        images::ImageProbe,
        manifest::WebAppManifest,
        markdown::MarkdownRenderer,
        offline::{
            CacheRequest, InstallReport, Network, PrecacheEntry, PrecacheOptions, RouteTable,
            ServiceWorkerConfig, Strategy, build_manifest, render_service_worker, verify_install,
        },
        seo::{OgImageKind, SeoService, StructuredData, is_valid_og_image},
        sitemap::{SitemapEntry, SitemapService},
        syndication::SyndicationService,
    },
    config::Settings,
    domain::{
        posts::{BlogPost, published, tag_counts},
        seo::{OpenGraphOverrides, OpenGraphType, SeoDescriptor, SeoOverrides},
    },
    presentation::views::{
        BlogIndexTemplate, ErrorPageView, ErrorTemplate, IndexTemplate, LayoutChrome,
        LayoutContext, PageMetaView, PostTemplate, ResumeTemplate, render_template, tag_path,
    },
    util::security::{DEFAULT_TEXT_LIMIT, validate_content, validate_required, validate_text},
};

const FAVICON_PATH: &str = "/favicon.svg";
const NOT_FOUND_PAGE: &str = "/404.html";

/// Summary of a finished build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub output_dir: PathBuf,
    pub today: Date,
    pub pages: usize,
    pub posts: usize,
    pub external_posts: usize,
    pub tags: usize,
    pub assets_copied: usize,
    pub cache_name: String,
    pub precache: Vec<PrecacheEntry>,
}

/// Content statistics from a validation-only run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub posts: usize,
    pub drafts: usize,
    pub external_posts: usize,
    pub experiences: usize,
    /// Problems that do not stop a build.
    pub warnings: usize,
}

struct RenderStats {
    pages: usize,
    posts: usize,
    external_posts: usize,
    tags: usize,
}

/// Caching strategy the worker applies to one output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePlanEntry {
    pub path: String,
    pub strategy: Strategy,
}

pub struct SiteBuilder {
    settings: Settings,
    renderer: MarkdownRenderer,
    seo: SeoService,
    images: ImageProbe,
    routes: RouteTable,
}

impl SiteBuilder {
    pub fn new(settings: Settings) -> Self {
        let routes = RouteTable::with_default_rules(&settings.site.url);
        Self {
            renderer: MarkdownRenderer::new(),
            seo: SeoService::new(settings.site.clone()),
            images: ImageProbe::new(&settings.paths.public_dir),
            routes,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Reference date for ages, durations and relative dates.
    pub fn today(&self) -> Date {
        self.settings
            .build
            .build_date
            .unwrap_or_else(|| OffsetDateTime::now_utc().date())
    }

    fn repository(&self) -> ContentRepository {
        ContentRepository::new(&self.settings.paths.content_dir, &self.settings.site.author)
    }

    /// Load and render everything in memory without touching the output directory.
    pub async fn check(&self) -> Result<CheckReport, AppError> {
        let content = self.repository().load().await?;
        let visible = published(&content.posts, self.settings.build.include_drafts);
        let mut warnings = 0usize;
        for post in visible.iter().filter(|post| post.external_url().is_none()) {
            self.renderer.render(&post.body).inspect_err(|err| {
                error!(
                    target = "application::site",
                    slug = %post.slug,
                    error = %err,
                    "post failed to render"
                );
            })?;
            if !validate_content(&post.body) {
                warnings += 1;
                warn!(
                    target = "application::site",
                    slug = %post.slug,
                    "post contains scripts or inline handlers; they are stripped on render"
                );
            }
            if let Err(err) =
                validate_required(post.frontmatter.description.as_deref(), "description")
            {
                warnings += 1;
                warn!(
                    target = "application::site",
                    slug = %post.slug,
                    error = %err,
                    "post has no meta description"
                );
            }
            if let Some(description) = post.frontmatter.description.as_deref()
                && !validate_text(description, DEFAULT_TEXT_LIMIT)
            {
                warnings += 1;
                warn!(
                    target = "application::site",
                    slug = %post.slug,
                    "description is too long or contains markup"
                );
            }
            if let Some(hero) = &post.frontmatter.hero_image
                && hero.src.starts_with('/')
                && !tokio::fs::try_exists(
                    self.settings
                        .paths
                        .public_dir
                        .join(hero.src.trim_start_matches('/')),
                )
                .await
                .unwrap_or(false)
            {
                warnings += 1;
                warn!(
                    target = "application::site",
                    slug = %post.slug,
                    src = %hero.src,
                    "hero image missing from public directory"
                );
            }
        }

        Ok(CheckReport {
            posts: visible.len(),
            drafts: content.posts.iter().filter(|post| post.is_draft()).count(),
            external_posts: visible
                .iter()
                .filter(|post| post.external_url().is_some())
                .count(),
            experiences: content.experiences.len(),
            warnings,
        })
    }

    pub async fn build(&self) -> Result<BuildReport, AppError> {
        let today = self.today();
        let content = self.repository().load().await?;
        let output = OutputDir::new(&self.settings.paths.output_dir);
        output.reset().await?;
        let assets_copied = output.copy_tree(&self.settings.paths.public_dir).await?;

        let stats = self.render_site(&content, &output, today).await?;
        let precache = self.write_service_worker(&output).await?;

        info!(
            target = "application::site",
            output = %output.root().display(),
            pages = stats.pages,
            posts = stats.posts,
            assets_copied,
            precached = precache.len(),
            "site built"
        );

        Ok(BuildReport {
            output_dir: output.root().to_path_buf(),
            today,
            pages: stats.pages,
            posts: stats.posts,
            external_posts: stats.external_posts,
            tags: stats.tags,
            assets_copied,
            cache_name: self.settings.offline.cache_name(),
            precache,
        })
    }

    async fn render_site(
        &self,
        content: &SiteContent,
        output: &OutputDir,
        today: Date,
    ) -> Result<RenderStats, AppError> {
        let site = &self.settings.site;
        let posts = published(&content.posts, self.settings.build.include_drafts);
        let local: Vec<&BlogPost> = posts
            .iter()
            .copied()
            .filter(|post| post.external_url().is_none())
            .collect();
        let tags = tag_counts(posts.iter().copied());
        let mut page_count = 0usize;
        let mut sitemap = vec![
            SitemapEntry::new("/", None),
            SitemapEntry::new("/blog/", None),
            SitemapEntry::new("/resume/", None),
        ];

        // Home
        let seo = self.seo.generate_seo(SeoOverrides {
            canonical: Some(site.absolute("/")),
            ..Default::default()
        });
        let meta = self.page_meta(&seo, &[self.seo.website_data(), self.seo.person_data()])?;
        let view = pages::home_view(site, &posts, &content.experiences, today);
        let html = render_template(IndexTemplate {
            view: LayoutContext::new(self.chrome(meta, "/", today), view),
        })?;
        output.write(&page_file("/"), html).await?;
        page_count += 1;

        // Blog index and one listing per tag
        let seo = self.listing_seo("Blog", "/blog/");
        let meta = self.page_meta(&seo, &[])?;
        let view = pages::blog_index_view(site, &posts, &tags, None, today);
        let html = render_template(BlogIndexTemplate {
            view: LayoutContext::new(self.chrome(meta, "/blog/", today), view),
        })?;
        output.write(&page_file("/blog/"), html).await?;
        page_count += 1;

        for (slug, tag) in &tags {
            let route = tag_path(slug);
            let seo = self.listing_seo(&format!("#{}", tag.label), &route);
            let meta = self.page_meta(&seo, &[])?;
            let view = pages::blog_index_view(site, &posts, &tags, Some(slug.as_str()), today);
            let html = render_template(BlogIndexTemplate {
                view: LayoutContext::new(self.chrome(meta, &route, today), view),
            })?;
            output.write(&page_file(&route), html).await?;
            sitemap.push(SitemapEntry::new(route, None));
            page_count += 1;
        }

        // Posts hosted on this site
        for post in &local {
            let rendered = self.renderer.render(&post.body).inspect_err(|err| {
                error!(
                    target = "application::site",
                    slug = %post.slug,
                    error = %err,
                    "post failed to render"
                );
            })?;
            let route = post.path();
            let seo = self.seo.generate_blog_post_seo(post);
            let meta = self.page_meta(&seo, &[self.seo.article_data(post)])?;
            let series = pages::series_entries(post, &local);
            let view = pages::post_detail_view(post, rendered, series, &self.images);
            let html = render_template(PostTemplate {
                view: LayoutContext::new(self.chrome(meta, &route, today), view),
            })?;
            output.write(&page_file(&route), html).await?;
            sitemap.push(SitemapEntry::new(
                route,
                Some(post.frontmatter.last_modified.unwrap_or(post.pub_date())),
            ));
            page_count += 1;
            debug!(target = "application::site", slug = %post.slug, "rendered post");
        }

        // Resume
        let seo = self.seo.generate_seo(SeoOverrides {
            title: Some("Resume".to_string()),
            description: Some(format!("Professional experience of {}.", site.author)),
            canonical: Some(site.absolute("/resume/")),
            open_graph: OpenGraphOverrides {
                image: Some(self.seo.og_image(OgImageKind::Profile)),
                ..Default::default()
            },
            ..Default::default()
        });
        let meta = self.page_meta(&seo, &[self.seo.person_data()])?;
        let view = pages::resume_view(site, &content.experiences, today);
        let html = render_template(ResumeTemplate {
            view: LayoutContext::new(self.chrome(meta, "/resume/", today), view),
        })?;
        output.write(&page_file("/resume/"), html).await?;
        page_count += 1;

        // Offline fallback and not-found pages
        for (route, page) in [
            (self.settings.offline.offline_path.as_str(), ErrorPageView::offline()),
            (NOT_FOUND_PAGE, ErrorPageView::not_found()),
        ] {
            let seo = self.seo.generate_seo(SeoOverrides {
                title: Some(page.title.clone()),
                description: Some(page.message.clone()),
                ..Default::default()
            });
            let meta = self.page_meta(&seo, &[])?;
            let html = render_template(ErrorTemplate {
                view: LayoutContext::new(self.chrome(meta, route, today), page),
            })?;
            output.write(&page_file(route), html).await?;
            page_count += 1;
        }

        // Feeds and machine-readable files
        let syndication = SyndicationService::new(site.clone());
        output.write("/rss.xml", syndication.rss_feed(&posts)).await?;

        let sitemap_service = SitemapService::new(site.clone());
        output
            .write("/sitemap.xml", sitemap_service.sitemap_xml(&sitemap))
            .await?;
        output.write("/robots.txt", sitemap_service.robots_txt()).await?;

        let manifest = WebAppManifest::for_site(site, FAVICON_PATH)
            .to_json()
            .map_err(|err| AppError::unexpected(format!("failed to encode manifest: {err}")))?;
        output.write("/manifest.json", manifest).await?;

        Ok(RenderStats {
            pages: page_count,
            posts: local.len(),
            external_posts: posts.len() - local.len(),
            tags: tags.len(),
        })
    }

    /// Hash the finished output into the precache manifest, then render `sw.js`.
    async fn write_service_worker(
        &self,
        output: &OutputDir,
    ) -> Result<Vec<PrecacheEntry>, AppError> {
        let offline = &self.settings.offline;
        let root = output.root().to_path_buf();
        let options = PrecacheOptions {
            max_file_bytes: offline.max_precache_bytes.get(),
            ..Default::default()
        };
        let precache = tokio::task::spawn_blocking(move || build_manifest(&root, &options))
            .await
            .map_err(|err| AppError::unexpected(format!("precache task failed: {err}")))??;

        let cache_name = offline.cache_name();
        let script = render_service_worker(&ServiceWorkerConfig {
            cache_name: &cache_name,
            offline_path: &offline.offline_path,
            precache: &precache,
            routes: &self.routes,
            max_entry_age: offline.max_entry_age,
            cleanup_interval: offline.cleanup_interval,
        })?;
        output.write("/sw.js", script).await?;
        Ok(precache)
    }

    /// Replay the worker install against `network` so missing critical assets fail the build.
    pub async fn verify_offline<N: Network>(
        &self,
        network: Arc<N>,
        report: &BuildReport,
    ) -> Result<InstallReport, AppError> {
        let offline = &self.settings.offline;
        let config = ServiceWorkerConfig {
            cache_name: &report.cache_name,
            offline_path: &offline.offline_path,
            precache: &report.precache,
            routes: &self.routes,
            max_entry_age: offline.max_entry_age,
            cleanup_interval: offline.cleanup_interval,
        };
        Ok(verify_install(network, &config, &self.settings.site.url).await?)
    }

    /// Strategy selected for every file currently in the output directory.
    pub fn route_plan(&self) -> Result<Vec<RoutePlanEntry>, AppError> {
        let root = &self.settings.paths.output_dir;
        let mut plan = Vec::new();
        if !root.is_dir() {
            return Ok(plan);
        }
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|err| {
                AppError::unexpected(format!("failed to walk `{}`: {err}", root.display()))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let path = route_for(&relative.to_string_lossy().replace('\\', "/"));
            let Ok(url) = self.settings.site.url.join(&path) else {
                continue;
            };
            let request = if path.ends_with('/') || path.ends_with(".html") {
                CacheRequest::navigation(url)
            } else {
                CacheRequest::get(url)
            };
            let strategy = self
                .routes
                .select(&request)
                .unwrap_or(Strategy::NetworkOnly);
            plan.push(RoutePlanEntry { path, strategy });
        }
        Ok(plan)
    }

    fn listing_seo(&self, title: &str, route: &str) -> SeoDescriptor {
        self.seo.generate_seo(SeoOverrides {
            title: Some(title.to_string()),
            description: Some(format!(
                "Articles by {} on {}.",
                self.settings.site.author, self.settings.site.title
            )),
            canonical: Some(self.settings.site.absolute(route)),
            open_graph: OpenGraphOverrides {
                kind: Some(OpenGraphType::Website),
                image: Some(self.seo.og_image(OgImageKind::Blog)),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn page_meta(
        &self,
        seo: &SeoDescriptor,
        structured: &[StructuredData],
    ) -> Result<PageMetaView, AppError> {
        let json_ld = structured
            .iter()
            .map(StructuredData::to_json_ld)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| AppError::unexpected(format!("failed to encode JSON-LD: {err}")))?;
        if !is_valid_og_image(seo.open_graph.image.as_deref()) {
            warn!(
                target = "application::site",
                title = %seo.title,
                "page has no absolute Open Graph image"
            );
        }
        Ok(PageMetaView::from_seo(seo, &self.settings.site, json_ld))
    }

    fn chrome(&self, meta: PageMetaView, route: &str, today: Date) -> LayoutChrome {
        LayoutChrome::for_site(&self.settings.site, meta, today.year()).with_active(route)
    }
}

/// `blog/post/index.html` → `/blog/post/`; other files keep their name.
fn route_for(relative: &str) -> String {
    match relative.strip_suffix("index.html") {
        Some(dir) => format!("/{dir}"),
        None => format!("/{relative}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_strip_index_files() {
        assert_eq!(route_for("index.html"), "/");
        assert_eq!(route_for("blog/hello/index.html"), "/blog/hello/");
        assert_eq!(route_for("rss.xml"), "/rss.xml");
    }
}
