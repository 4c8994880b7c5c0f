//! Precache manifest injected into the generated service worker.

use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
};

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::DEFAULT_MAX_PRECACHE_BYTES;

pub const PRECACHE_EXTENSIONS: [&str; 12] = [
    "html", "js", "css", "woff", "woff2", "png", "jpg", "jpeg", "webp", "avif", "svg", "json",
];

/// Hex characters kept from the SHA-256 digest.
const REVISION_LEN: usize = 32;

/// Bytes the URL parser escapes inside a path segment, plus `%` and `/`.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'%')
    .add(b'/');

#[derive(Debug, Error)]
pub enum PrecacheError {
    #[error("failed to walk `{path}`: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("failed to read `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrecacheEntry {
    pub url: String,
    pub revision: String,
}

#[derive(Debug, Clone)]
pub struct PrecacheOptions {
    pub max_file_bytes: u64,
    /// Navigations are served stale-while-revalidate, so pages stay out of the precache.
    pub include_html: bool,
}

impl Default for PrecacheOptions {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_PRECACHE_BYTES,
            include_html: false,
        }
    }
}

/// Walk `root` and list the files the worker should fetch on install, sorted by URL.
pub fn build_manifest(
    root: &Path,
    options: &PrecacheOptions,
) -> Result<Vec<PrecacheEntry>, PrecacheError> {
    let mut entries = Vec::new();
    let mut skipped_large = 0usize;

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|source| PrecacheError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let url = to_url(relative);

        if is_ignored(&url) || !has_precache_extension(path) {
            continue;
        }
        if !options.include_html && url.ends_with(".html") {
            continue;
        }

        let size = entry
            .metadata()
            .map_err(|source| PrecacheError::Walk {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        if size > options.max_file_bytes {
            skipped_large += 1;
            continue;
        }

        entries.push(PrecacheEntry {
            revision: revision_for(path)?,
            url,
        });
    }

    entries.sort_by(|a, b| a.url.cmp(&b.url));
    debug!(
        target = "application::offline::precache",
        entries = entries.len(),
        skipped_large,
        "built precache manifest"
    );
    Ok(entries)
}

/// Site URL for a file, escaped the way a browser would request it.
fn to_url(relative: &Path) -> String {
    let joined = relative
        .components()
        .map(|component| {
            let segment = component.as_os_str().to_string_lossy();
            utf8_percent_encode(&segment, PATH_SEGMENT).to_string()
        })
        .collect::<Vec<_>>()
        .join("/");
    format!("/{joined}")
}

fn has_precache_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            PRECACHE_EXTENSIONS
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
}

/// The worker itself, workbox chunks, bundle reports and vendored modules.
fn is_ignored(url: &str) -> bool {
    let file_name = url.rsplit('/').next().unwrap_or(url);
    url == "/sw.js"
        || (url.matches('/').count() == 1
            && file_name.starts_with("workbox-")
            && file_name.ends_with(".js"))
        || file_name == "stats.html"
        || url.contains("/node_modules/")
}

fn revision_for(path: &Path) -> Result<String, PrecacheError> {
    let mut file = fs::File::open(path).map_err(|source| PrecacheError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer).map_err(|source| PrecacheError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    let digest = hasher.finalize().to_vec();
    let mut revision = hex::encode(digest);
    revision.truncate(REVISION_LEN);
    Ok(revision)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, relative: &str, bytes: &[u8]) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, bytes).expect("write");
    }

    #[test]
    fn filters_and_sorts_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        write(root, "index.html", b"<html></html>");
        write(root, "sw.js", b"self");
        write(root, "workbox-1234.js", b"wb");
        write(root, "stats.html", b"stats");
        write(root, "assets/site.css", b"body{}");
        write(root, "favicon.svg", b"<svg/>");
        write(root, "manifest.json", b"{}");
        write(root, "notes.txt", b"plain");
        write(root, "blog/post/index.html", b"<html></html>");

        let entries = build_manifest(root, &PrecacheOptions::default()).expect("manifest");
        let urls: Vec<&str> = entries.iter().map(|entry| entry.url.as_str()).collect();
        assert_eq!(urls, vec!["/assets/site.css", "/favicon.svg", "/manifest.json"]);
        assert!(entries.iter().all(|entry| entry.revision.len() == REVISION_LEN));
    }

    #[test]
    fn skips_files_over_size_limit() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "big.png", &[0u8; 64]);
        write(dir.path(), "small.png", &[0u8; 8]);

        let options = PrecacheOptions {
            max_file_bytes: 32,
            ..Default::default()
        };
        let entries = build_manifest(dir.path(), &options).expect("manifest");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url, "/small.png");
    }

    #[test]
    fn urls_are_escaped_like_browser_requests() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "images/my photo.png", b"png");
        write(dir.path(), "fonts/café#1.woff2", b"font");

        let entries = build_manifest(dir.path(), &PrecacheOptions::default()).expect("manifest");
        let urls: Vec<&str> = entries.iter().map(|entry| entry.url.as_str()).collect();
        assert_eq!(urls, vec!["/fonts/caf%C3%A9%231.woff2", "/images/my%20photo.png"]);

        let site = url::Url::parse("https://jane.dev/").expect("site");
        for url in urls {
            assert_eq!(site.join(url).expect("join").path(), url);
        }
    }

    #[test]
    fn revision_changes_with_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "a.css", b"one");
        let first = build_manifest(dir.path(), &PrecacheOptions::default()).expect("manifest");
        write(dir.path(), "a.css", b"two");
        let second = build_manifest(dir.path(), &PrecacheOptions::default()).expect("manifest");
        assert_ne!(first[0].revision, second[0].revision);
    }
}
