//! Serving stored meme images, with conditional-request handling so
//! browsers and CDNs can cache them.

use std::path::Path;
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::header::{
    CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use httpdate::{fmt_http_date, parse_http_date};
use regex::Regex;
use tracing::error;

use crate::constants::IMAGE_CACHE_CONTROL;

/// File names we are willing to look up in the image store. Anything else
/// (separators, traversal attempts, other extensions) is a 404.
#[allow(clippy::expect_used)]
static SERVABLE_FILE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.-]+\.jpg$").expect("static pattern compiles"));

/// Cache validators derived from a stored image's metadata.
#[derive(Clone, Debug)]
struct CacheValidators {
    etag: Option<HeaderValue>,
    last_modified: Option<HeaderValue>,
    modified_at: Option<SystemTime>,
}

impl CacheValidators {
    fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        let modified_at = metadata.modified().ok();
        let modified_secs = match modified_at {
            Some(modified) => modified
                .duration_since(UNIX_EPOCH)
                .map(|duration| duration.as_secs().to_string())
                .unwrap_or_else(|_| "0".to_string()),
            None => "0".to_string(),
        };
        let etag =
            HeaderValue::from_str(&format!("W/\"{}-{}\"", metadata.len(), modified_secs)).ok();
        let last_modified =
            modified_at.and_then(|modified| HeaderValue::from_str(&fmt_http_date(modified)).ok());
        Self {
            etag,
            last_modified,
            modified_at,
        }
    }

    fn apply(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(IMAGE_CACHE_CONTROL.as_str()) {
            headers.insert(CACHE_CONTROL, value);
        }
        if let Some(etag) = &self.etag {
            headers.insert(ETAG, etag.clone());
        }
        if let Some(last_modified) = &self.last_modified {
            headers.insert(LAST_MODIFIED, last_modified.clone());
        }
    }

    /// True when the request's conditional headers say the client copy is
    /// still current. `If-None-Match` wins over `If-Modified-Since`.
    fn not_modified(&self, request_headers: &HeaderMap) -> bool {
        if let Some(if_none_match) = request_headers.get(IF_NONE_MATCH) {
            if let Ok(value) = if_none_match.to_str() {
                let value = value.trim();
                if value == "*" {
                    return true;
                }
                if let Some(etag) = self.etag.as_ref().and_then(|etag| etag.to_str().ok())
                    && value.split(',').any(|candidate| candidate.trim() == etag)
                {
                    return true;
                }
            }
            return false;
        }

        if let (Some(if_modified_since), Some(modified_at)) =
            (request_headers.get(IF_MODIFIED_SINCE), self.modified_at)
            && let Ok(value) = if_modified_since.to_str()
            && let Ok(since) = parse_http_date(value)
            && modified_at <= since
        {
            return true;
        }

        false
    }
}

fn plain_response(status: StatusCode, message: &'static str) -> Response {
    let mut response = Response::new(Body::from(message));
    *response.status_mut() = status;
    response
}

/// Serves one stored meme image: 404 for unknown or unservable names, 304
/// when the client copy is current, otherwise the bytes with cache headers.
pub(crate) async fn meme_image_response(
    image_dir: &Path,
    file_name: &str,
    request_headers: &HeaderMap,
) -> Response {
    if !SERVABLE_FILE_NAME.is_match(file_name) {
        return plain_response(StatusCode::NOT_FOUND, "Not Found");
    }

    let path = image_dir.join(file_name);
    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) => metadata,
        Err(_) => return plain_response(StatusCode::NOT_FOUND, "Not Found"),
    };
    let validators = CacheValidators::from_metadata(&metadata);

    if validators.not_modified(request_headers) {
        let mut response = plain_response(StatusCode::NOT_MODIFIED, "");
        validators.apply(response.headers_mut());
        return response;
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!("Failed to read stored meme {}: {}", path.display(), err);
            return plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    let mut response = Response::new(Body::from(bytes));
    if let Ok(value) = HeaderValue::from_str("image/jpeg") {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    validators.apply(response.headers_mut());
    response
}
