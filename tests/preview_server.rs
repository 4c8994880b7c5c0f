use std::{fs, num::NonZeroU32};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use folio::{
    config::{self, CliArgs, Settings},
    infra::http::{HttpState, build_router},
};
use tempfile::TempDir;
use tower::ServiceExt;

fn settings() -> Settings {
    config::load(&CliArgs {
        config_file: None,
        command: None,
    })
    .expect("settings")
}

fn site_dir() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(dir.path().join("blog/hello")).expect("mkdir");
    fs::write(dir.path().join("index.html"), "<h1>home</h1>").expect("index");
    fs::write(dir.path().join("blog/hello/index.html"), "<h1>hello</h1>").expect("post");
    fs::write(dir.path().join("site.css"), "body{}").expect("css");
    fs::write(dir.path().join("sw.js"), "self.addEventListener('fetch', () => {});").expect("sw");
    dir
}

fn router(dir: &TempDir, settings: &Settings) -> Router {
    build_router(HttpState::new(
        dir.path(),
        &settings.site,
        &settings.rate_limit,
    ))
}

async fn send(router: Router, method: Method, uri: &str) -> Response {
    router
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("x-forwarded-for", "203.0.113.9")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response")
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

#[tokio::test]
async fn serves_directory_indexes_with_hardening_headers() {
    let dir = site_dir();
    let response = send(router(&dir, &settings()), Method::GET, "/blog/hello").await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/html; charset=utf-8");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["referrer-policy"], "strict-origin-when-cross-origin");
    assert!(headers.contains_key("permissions-policy"));
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(body_text(response).await, "<h1>hello</h1>");
}

#[tokio::test]
async fn assets_are_cacheable_but_the_worker_is_not() {
    let dir = site_dir();
    let settings = settings();

    let css = send(router(&dir, &settings), Method::GET, "/site.css").await;
    assert_eq!(css.headers()[header::CACHE_CONTROL], "public, max-age=3600");

    let sw = send(router(&dir, &settings), Method::GET, "/sw.js").await;
    assert_eq!(sw.headers()[header::CACHE_CONTROL], "no-cache");
}

#[tokio::test]
async fn escaped_request_paths_find_files() {
    let dir = site_dir();
    fs::write(dir.path().join("my notes.css"), "p{}").expect("spaced css");

    let response = send(router(&dir, &settings()), Method::GET, "/my%20notes.css").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "p{}");
}

#[tokio::test]
async fn missing_files_use_the_built_not_found_page() {
    let dir = site_dir();
    fs::write(dir.path().join("404.html"), "<h1>custom 404</h1>").expect("404");

    let response = send(router(&dir, &settings()), Method::GET, "/nope/").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "<h1>custom 404</h1>");
}

#[tokio::test]
async fn missing_not_found_page_is_rendered_on_the_fly() {
    let dir = site_dir();

    let response = send(router(&dir, &settings()), Method::GET, "/nope").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("Page Not Found"));
}

#[tokio::test]
async fn traversal_is_treated_as_not_found() {
    let dir = site_dir();

    let response = send(router(&dir, &settings()), Method::GET, "/../secret").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_get_and_head_are_allowed() {
    let dir = site_dir();
    let settings = settings();

    let head = send(router(&dir, &settings), Method::HEAD, "/").await;
    assert_eq!(head.status(), StatusCode::OK);

    let post = send(router(&dir, &settings), Method::POST, "/").await;
    assert_eq!(post.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(post.headers()[header::ALLOW], "GET, HEAD");
}

#[tokio::test]
async fn clients_over_the_limit_get_retry_after() {
    let dir = site_dir();
    let mut settings = settings();
    settings.rate_limit.max_requests = NonZeroU32::MIN;
    let app = router(&dir, &settings);

    let first = send(app.clone(), Method::GET, "/").await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = send(app, Method::GET, "/").await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(second.headers()["x-frame-options"], "DENY");
}
