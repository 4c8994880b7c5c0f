//! Loads and validates posts and experience data from the content directory.

use std::{
    collections::HashSet,
    path::{Component, Path, PathBuf},
};

use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{
    application::error::AppError,
    domain::{
        experience::{Experience, ExperienceFile},
        posts::{BlogPost, Frontmatter, split_frontmatter},
    },
    infra::error::InfraError,
    util::{sanitize::sanitize_slug, security::validate_slug},
};

pub const BLOG_DIR: &str = "blog";
pub const EXPERIENCE_FILE: &str = "experiences.toml";
const POST_EXTENSIONS: [&str; 2] = ["md", "mdx"];
const TAGS_SEGMENT: &str = "tags";

#[derive(Debug, Clone, Default)]
pub struct SiteContent {
    pub posts: Vec<BlogPost>,
    pub experiences: Vec<Experience>,
}

#[derive(Debug, Clone)]
pub struct ContentRepository {
    content_dir: PathBuf,
    default_author: String,
}

impl ContentRepository {
    pub fn new(content_dir: impl Into<PathBuf>, default_author: impl Into<String>) -> Self {
        Self {
            content_dir: content_dir.into(),
            default_author: default_author.into(),
        }
    }

    pub async fn load(&self) -> Result<SiteContent, AppError> {
        let posts = self.load_posts().await?;
        let experiences = self.load_experiences().await?;
        info!(
            target = "application::content",
            posts = posts.len(),
            experiences = experiences.len(),
            "content loaded"
        );
        Ok(SiteContent { posts, experiences })
    }

    /// Every post under `blog/`, drafts included, in path order.
    pub async fn load_posts(&self) -> Result<Vec<BlogPost>, AppError> {
        let blog_dir = self.content_dir.join(BLOG_DIR);
        if !fs::try_exists(&blog_dir)
            .await
            .map_err(|err| InfraError::path(&blog_dir, err))?
        {
            warn!(
                target = "application::content",
                dir = %blog_dir.display(),
                "blog directory missing, no posts loaded"
            );
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&blog_dir).sort_by_file_name() {
            let entry = entry.map_err(|err| {
                AppError::content(&blog_dir, format!("failed to list posts: {err}"))
            })?;
            if entry.file_type().is_file() && is_post_file(entry.path()) {
                files.push(entry.into_path());
            }
        }

        let mut posts = Vec::with_capacity(files.len());
        let mut seen = HashSet::new();
        for path in files {
            let source = fs::read_to_string(&path)
                .await
                .map_err(|err| InfraError::path(&path, err))?;
            let relative = path.strip_prefix(&blog_dir).unwrap_or(&path);
            let slug = slug_for(relative);
            check_slug(&path, &slug)?;
            if !seen.insert(slug.clone()) {
                return Err(AppError::content(
                    &path,
                    format!("slug `{slug}` is used by another post"),
                ));
            }
            let post = parse_post(&path, slug, &source, &self.default_author)?;
            debug!(
                target = "application::content",
                slug = %post.slug,
                draft = post.is_draft(),
                "parsed post"
            );
            posts.push(post);
        }
        Ok(posts)
    }

    /// Experiences in file order; a missing file means an empty resume.
    pub async fn load_experiences(&self) -> Result<Vec<Experience>, AppError> {
        let path = self.content_dir.join(EXPERIENCE_FILE);
        let source = match fs::read_to_string(&path).await {
            Ok(source) => source,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    target = "application::content",
                    path = %path.display(),
                    "experience file missing"
                );
                return Ok(Vec::new());
            }
            Err(err) => return Err(InfraError::path(&path, err).into()),
        };
        parse_experiences(&path, &source)
    }
}

pub fn parse_post(
    path: &Path,
    slug: String,
    source: &str,
    default_author: &str,
) -> Result<BlogPost, AppError> {
    let (yaml, body) = split_frontmatter(source);
    if yaml.is_empty() {
        return Err(AppError::content(path, "missing `---` frontmatter block"));
    }

    let frontmatter: Frontmatter = serde_yaml_ng::from_str(yaml)
        .map_err(|err| AppError::content(path, format!("invalid frontmatter: {err}")))?;
    frontmatter
        .validate()
        .map_err(|err| AppError::content(path, err.to_string()))?;

    let author = frontmatter
        .author
        .clone()
        .filter(|author| !author.trim().is_empty())
        .unwrap_or_else(|| default_author.to_string());

    Ok(BlogPost {
        slug,
        author,
        frontmatter,
        body: body.to_string(),
    })
}

pub fn parse_experiences(path: &Path, source: &str) -> Result<Vec<Experience>, AppError> {
    let file: ExperienceFile = toml::from_str(source)
        .map_err(|err| AppError::content(path, format!("invalid experience data: {err}")))?;

    let mut ids = HashSet::new();
    for experience in &file.experiences {
        experience
            .validate()
            .map_err(|err| AppError::content(path, err.to_string()))?;
        if !ids.insert(experience.id.as_str()) {
            return Err(AppError::content(
                path,
                format!("duplicate experience id `{}`", experience.id),
            ));
        }
    }
    Ok(file.experiences)
}

fn is_post_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| POST_EXTENSIONS.contains(&ext))
}

/// `2024/hello-world.md` → `2024/hello-world`; `guide/index.md` → `guide`.
fn slug_for(relative: &Path) -> String {
    let without_ext = relative.with_extension("");
    let mut segments: Vec<String> = without_ext
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(sanitize_slug(&part.to_string_lossy())),
            _ => None,
        })
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.len() > 1 && segments.last().is_some_and(|last| last == "index") {
        segments.pop();
    }
    segments.join("/")
}

/// Posts are written to `/blog/<slug>/`, next to the index and tag listings.
fn check_slug(path: &Path, slug: &str) -> Result<(), AppError> {
    if slug.is_empty() {
        return Err(AppError::content(path, "file name produces an empty slug"));
    }
    if slug.split('/').any(|segment| validate_slug(segment).is_err()) {
        return Err(AppError::content(
            path,
            format!("slug `{slug}` is not a valid URL segment"),
        ));
    }
    if slug.split('/').next() == Some(TAGS_SEGMENT) {
        return Err(AppError::content(
            path,
            format!("slug `{slug}` collides with the tag listings"),
        ));
    }
    Ok(())
}
