use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{
        HeaderValue, Method, Request, StatusCode,
        header::{ALLOW, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use mime_guess::Mime;
use percent_encoding::percent_decode_str;
use tracing::error;

use crate::{
    application::error::{ErrorReport, HttpError},
    presentation::views::{LayoutChrome, render_not_found_response},
    util::security::RateLimiter,
};

use super::middleware::{apply_security_headers, log_responses, rate_limit, set_request_context};

const NOT_FOUND_FILE: &str = "404.html";
const SERVICE_WORKER_FILE: &str = "sw.js";

#[derive(Clone)]
pub struct HttpState {
    pub root: Arc<PathBuf>,
    /// Used to render a not-found page when the build has no `404.html`.
    pub chrome: Arc<LayoutChrome>,
    pub limiter: RateLimiter,
}

pub fn build_router(state: HttpState) -> Router {
    let limiter = state.limiter.clone();
    Router::new()
        .fallback(serve_file)
        .with_state(state)
        .layer(middleware::from_fn_with_state(limiter, rate_limit))
        .layer(middleware::from_fn(apply_security_headers))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn serve_file(State(state): State<HttpState>, request: Request<Body>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_file";

    let method = request.method();
    if method != Method::GET && method != Method::HEAD {
        let mut response = HttpError::new(
            SOURCE,
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
            format!("{method} is not supported by the preview server"),
        )
        .into_response();
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
        return response;
    }

    let path = request.uri().path().to_string();
    let Some(candidates) = candidate_files(&path) else {
        return not_found(&state, SOURCE).await;
    };

    for relative in candidates {
        let target = state.root.join(&relative);
        match tokio::fs::read(&target).await {
            Ok(bytes) => return file_response(&relative, Bytes::from(bytes), StatusCode::OK),
            Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::IsADirectory) => {
                continue;
            }
            Err(err) => {
                error!(
                    target = SOURCE,
                    path = %target.display(),
                    error = %err,
                    "failed to read output file"
                );
                return HttpError::from_error(
                    SOURCE,
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to read file",
                    &err,
                )
                .into_response();
            }
        }
    }

    not_found(&state, SOURCE).await
}

/// Output files that may answer `path`, most specific first.
fn candidate_files(path: &str) -> Option<Vec<String>> {
    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    let trimmed = decoded.trim_start_matches('/');
    if trimmed
        .split('/')
        .any(|segment| segment == ".." || segment.contains('\\') || segment.contains('\0'))
    {
        return None;
    }

    if trimmed.is_empty() {
        return Some(vec!["index.html".to_string()]);
    }
    if trimmed.ends_with('/') {
        return Some(vec![format!("{trimmed}index.html")]);
    }
    Some(vec![trimmed.to_string(), format!("{trimmed}/index.html")])
}

async fn not_found(state: &HttpState, source: &'static str) -> Response {
    match tokio::fs::read(state.root.join(NOT_FOUND_FILE)).await {
        Ok(bytes) => {
            let mut response =
                file_response(NOT_FOUND_FILE, Bytes::from(bytes), StatusCode::NOT_FOUND);
            ErrorReport::from_message(source, StatusCode::NOT_FOUND, "Resource not found")
                .attach(&mut response);
            response
        }
        Err(_) => render_not_found_response(state.chrome.as_ref().clone()),
    }
}

fn file_response(relative: &str, bytes: Bytes, status: StatusCode) -> Response {
    let mime = mime_guess::from_path(relative).first_or_octet_stream();
    let len = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&content_type(&mime)) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(CACHE_CONTROL, cache_control(relative, &mime));
    response
}

fn content_type(mime: &Mime) -> String {
    if mime.type_() == mime_guess::mime::TEXT || mime.subtype() == mime_guess::mime::JAVASCRIPT {
        format!("{}; charset=utf-8", mime.essence_str())
    } else {
        mime.essence_str().to_string()
    }
}

/// Pages and the worker must revalidate so new builds show up; assets may be reused briefly.
fn cache_control(relative: &str, mime: &Mime) -> HeaderValue {
    let is_page = mime.subtype() == mime_guess::mime::HTML;
    if is_page || relative.ends_with(SERVICE_WORKER_FILE) {
        HeaderValue::from_static("no-cache")
    } else {
        HeaderValue::from_static("public, max-age=3600")
    }
}
