//! Filesystem side of a build: cleaning, copying static assets and writing pages.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{application::error::AppError, infra::error::InfraError};

#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove stale output and recreate an empty directory.
    pub async fn reset(&self) -> Result<(), AppError> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => debug!(
                target = "application::site::output",
                dir = %self.root.display(),
                "removed previous output"
            ),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(InfraError::path(&self.root, err).into()),
        }
        fs::create_dir_all(&self.root)
            .await
            .map_err(|err| InfraError::path(&self.root, err))?;
        Ok(())
    }

    /// Write `contents` at a site path such as `/blog/index.html`.
    pub async fn write(&self, site_path: &str, contents: impl AsRef<[u8]>) -> Result<(), AppError> {
        let target = self.resolve(site_path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| InfraError::path(parent, err))?;
        }
        fs::write(&target, contents)
            .await
            .map_err(|err| InfraError::path(&target, err))?;
        debug!(
            target = "application::site::output",
            path = site_path,
            "wrote file"
        );
        Ok(())
    }

    /// Mirror `source` into the output root, returning the number of files copied.
    pub async fn copy_tree(&self, source: &Path) -> Result<usize, AppError> {
        if !fs::try_exists(source)
            .await
            .map_err(|err| InfraError::path(source, err))?
        {
            warn!(
                target = "application::site::output",
                dir = %source.display(),
                "static asset directory missing, nothing copied"
            );
            return Ok(0);
        }

        let mut copied = 0usize;
        for entry in WalkDir::new(source).follow_links(false) {
            let entry = entry.map_err(|err| {
                AppError::unexpected(format!(
                    "failed to walk `{}`: {err}",
                    source.display()
                ))
            })?;
            let Ok(relative) = entry.path().strip_prefix(source) else {
                continue;
            };
            let target = self.root.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)
                    .await
                    .map_err(|err| InfraError::path(&target, err))?;
            } else if entry.file_type().is_file() {
                fs::copy(entry.path(), &target)
                    .await
                    .map_err(|err| InfraError::path(entry.path(), err))?;
                copied += 1;
            }
        }
        Ok(copied)
    }

    fn resolve(&self, site_path: &str) -> Result<PathBuf, AppError> {
        let relative = site_path.trim_start_matches('/');
        if relative.is_empty() || relative.split('/').any(|part| part == "..") {
            return Err(AppError::validation(format!(
                "refusing to write outside the output directory: `{site_path}`"
            )));
        }
        Ok(self.root.join(relative))
    }
}

/// Output file for a page route: `/blog/` → `/blog/index.html`.
pub fn page_file(route: &str) -> String {
    if route.ends_with('/') {
        format!("{route}index.html")
    } else {
        route.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_routes_map_to_index_files() {
        assert_eq!(page_file("/"), "/index.html");
        assert_eq!(page_file("/blog/hello/"), "/blog/hello/index.html");
        assert_eq!(page_file("/404.html"), "/404.html");
    }

    #[tokio::test]
    async fn writes_nested_files_and_copies_assets() {
        let dir = tempfile::tempdir().expect("tempdir");
        let public = dir.path().join("public");
        std::fs::create_dir_all(public.join("images")).expect("mkdir");
        std::fs::write(public.join("images").join("a.svg"), "<svg/>").expect("write");
        std::fs::write(public.join("favicon.svg"), "<svg/>").expect("write");

        let output = OutputDir::new(dir.path().join("dist"));
        output.reset().await.expect("reset");
        output
            .write("/blog/post/index.html", "<html></html>")
            .await
            .expect("write");
        let copied = output.copy_tree(&public).await.expect("copy");

        assert_eq!(copied, 2);
        assert!(output.root().join("blog/post/index.html").is_file());
        assert!(output.root().join("images/a.svg").is_file());
    }

    #[tokio::test]
    async fn rejects_paths_escaping_the_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = OutputDir::new(dir.path());
        let err = output.write("/../escape.txt", "x").await.expect_err("escape");
        assert!(err.to_string().contains("outside the output directory"));
    }
}
