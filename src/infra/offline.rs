//! Serves a build directory as the worker's network during install verification.

use std::{io::ErrorKind, path::PathBuf};

use async_trait::async_trait;
use axum::http::{HeaderValue, StatusCode, header::CONTENT_TYPE};
use percent_encoding::percent_decode_str;
use time::OffsetDateTime;
use tracing::debug;
use url::{Origin, Url};

use crate::application::offline::{CacheRequest, CachedResponse, Network, NetworkError};

#[derive(Debug, Clone)]
pub struct DirectoryNetwork {
    root: PathBuf,
    origin: Origin,
}

impl DirectoryNetwork {
    pub fn new(root: impl Into<PathBuf>, site: &Url) -> Self {
        Self {
            root: root.into(),
            origin: site.origin(),
        }
    }

    fn file_for(&self, url: &Url) -> Option<PathBuf> {
        let decoded = percent_decode_str(url.path()).decode_utf8().ok()?;
        let path = decoded.trim_start_matches('/');
        if path
            .split('/')
            .any(|segment| segment == ".." || segment.contains('\\') || segment.contains('\0'))
        {
            return None;
        }
        let relative = if path.is_empty() || path.ends_with('/') {
            format!("{path}index.html")
        } else {
            path.to_string()
        };
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl Network for DirectoryNetwork {
    async fn fetch(&self, request: &CacheRequest) -> Result<CachedResponse, NetworkError> {
        if request.url.origin() != self.origin {
            return Err(NetworkError::new(&request.url, "cross-origin request"));
        }
        let Some(file) = self.file_for(&request.url) else {
            return Ok(CachedResponse::new(StatusCode::BAD_REQUEST, ""));
        };

        let response = match tokio::fs::read(&file).await {
            Ok(bytes) => {
                let mut response = CachedResponse::ok(bytes);
                let mime = mime_guess::from_path(&file).first_or_octet_stream();
                if let Ok(value) = HeaderValue::from_str(mime.essence_str()) {
                    response.headers.insert(CONTENT_TYPE, value);
                }
                response
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                CachedResponse::new(StatusCode::NOT_FOUND, "")
            }
            Err(err) => return Err(NetworkError::new(&request.url, err.to_string())),
        };
        debug!(
            target = "infra::offline",
            url = %request.url,
            status = response.status.as_u16(),
            "served from build directory"
        );
        Ok(response.with_date(OffsetDateTime::now_utc()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn maps_directories_to_index_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("offline")).expect("mkdir");
        std::fs::write(dir.path().join("offline/index.html"), "<p>offline</p>").expect("write");

        let site = Url::parse("https://jane.dev/").expect("url");
        let network = DirectoryNetwork::new(dir.path(), &site);

        let hit = network
            .fetch(&CacheRequest::get(site.join("/offline/").expect("join")))
            .await
            .expect("fetch");
        assert_eq!(hit.status, StatusCode::OK);
        assert_eq!(hit.headers.get(CONTENT_TYPE).expect("type"), "text/html");
        assert!(hit.date().is_some());

        let miss = network
            .fetch(&CacheRequest::get(site.join("/missing.css").expect("join")))
            .await
            .expect("fetch");
        assert_eq!(miss.status, StatusCode::NOT_FOUND);

        let foreign = Url::parse("https://cdn.example.com/x.js").expect("url");
        assert!(network.fetch(&CacheRequest::get(foreign)).await.is_err());
    }

    #[tokio::test]
    async fn escaped_paths_resolve_to_files_on_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("images")).expect("mkdir");
        std::fs::write(dir.path().join("images/my photo.png"), "png").expect("write");

        let site = Url::parse("https://jane.dev/").expect("url");
        let network = DirectoryNetwork::new(dir.path(), &site);

        let hit = network
            .fetch(&CacheRequest::get(site.join("/images/my photo.png").expect("join")))
            .await
            .expect("fetch");
        assert_eq!(hit.status, StatusCode::OK);
        assert_eq!(hit.body.as_ref(), b"png");

        let escaped_traversal = site.join("/images/..%2F..%2Fsecret").expect("join");
        let rejected = network
            .fetch(&CacheRequest::get(escaped_traversal))
            .await
            .expect("fetch");
        assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    }
}
