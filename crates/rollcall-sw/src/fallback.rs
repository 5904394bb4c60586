//! Responses served when the network is unreachable and nothing is cached.

use http::{HeaderName, HeaderValue, StatusCode};
use rollcall_net::{Request, RequestDestination, Response, ResponseType};
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::cache::{CacheKey, CacheStorage};
use crate::WorkerConfig;

/// Marks synthesized responses so pages can tell them apart.
pub const OFFLINE_HEADER: &str = "x-rollcall-offline";

const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Offline</title>
<style>
body { font-family: system-ui, sans-serif; text-align: center; padding: 3rem 1rem; color: #333; }
h1 { font-size: 1.5rem; }
</style>
</head>
<body>
<h1>You are offline</h1>
<p>Attendance will be available again once the connection is restored.</p>
</body>
</html>
"#;

const PLACEHOLDER_IMAGE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="200" viewBox="0 0 200 200"><rect width="200" height="200" fill="#e0e0e0"/><text x="100" y="105" font-family="sans-serif" font-size="16" fill="#757575" text-anchor="middle">Offline</text></svg>"##;

#[derive(Serialize)]
struct OfflineBody {
    error: &'static str,
    offline: bool,
}

/// Choose the fallback for a failed request.
pub fn offline_response(config: &WorkerConfig, caches: &CacheStorage, request: &Request) -> Response {
    match request.destination() {
        RequestDestination::Document => cached_document(config, caches)
            .unwrap_or_else(|| offline_page(request.url.clone())),
        RequestDestination::Image => placeholder_image(request.url.clone()),
        RequestDestination::Other => offline_json(request.url.clone()),
    }
}

/// First configured fallback document present in the cache.
fn cached_document(config: &WorkerConfig, caches: &CacheStorage) -> Option<Response> {
    config
        .fallback_documents
        .iter()
        .filter_map(|doc| config.resolve(doc).ok())
        .find_map(|url| caches.match_request(&CacheKey::get(&url)))
        .and_then(|entry| match entry.to_response() {
            Ok(response) => Some(response),
            Err(e) => {
                debug!(error = %e, "Cached fallback document unusable");
                None
            }
        })
}

/// Minimal HTML page telling the user they are offline.
pub fn offline_page(url: Url) -> Response {
    synthesized(url, StatusCode::OK, &mime::TEXT_HTML_UTF_8, OFFLINE_PAGE.as_bytes())
}

/// Grey SVG placeholder for images.
pub fn placeholder_image(url: Url) -> Response {
    synthesized(url, StatusCode::OK, &mime::IMAGE_SVG, PLACEHOLDER_IMAGE.as_bytes())
}

/// `503` with `{"error":"Network unavailable","offline":true}`.
pub fn offline_json(url: Url) -> Response {
    let body = serde_json::to_vec(&OfflineBody {
        error: "Network unavailable",
        offline: true,
    })
    .unwrap_or_default();
    synthesized(url, StatusCode::SERVICE_UNAVAILABLE, &mime::APPLICATION_JSON, &body)
}

fn synthesized(url: Url, status: StatusCode, content_type: &mime::Mime, body: &[u8]) -> Response {
    Response::new(url, status)
        .with_type(ResponseType::Basic)
        .with_content_type(content_type)
        .with_header(
            HeaderName::from_static(OFFLINE_HEADER),
            HeaderValue::from_static("1"),
        )
        .with_body(body.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheEntry;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_json_fallback_body() {
        let response = offline_json(url("http://localhost:3000/report.pdf"));
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.text().unwrap(),
            r#"{"error":"Network unavailable","offline":true}"#
        );
        assert_eq!(response.content_type(), Some(mime::APPLICATION_JSON));
        assert_eq!(response.header(OFFLINE_HEADER), Some("1"));
    }

    #[test]
    fn test_image_fallback_is_svg() {
        let request = Request::get(url("http://localhost:3000/photos/student.jpg"));
        let response = offline_response(&WorkerConfig::default(), &CacheStorage::new(), &request);
        assert_eq!(response.content_type(), Some(mime::IMAGE_SVG));
        assert!(response.text().unwrap().starts_with("<svg"));
    }

    #[test]
    fn test_document_without_cache_gets_offline_page() {
        let request = Request::navigate(url("http://localhost:3000/history"));
        let response = offline_response(&WorkerConfig::default(), &CacheStorage::new(), &request);
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.text().unwrap().contains("You are offline"));
        assert!(!response.from_cache);
    }

    #[test]
    fn test_document_prefers_cached_root() {
        let config = WorkerConfig::default();
        let root = config.root_url().unwrap();
        let mut caches = CacheStorage::new();
        let shell = Response::new(root.clone(), StatusCode::OK).with_body("<html>app</html>");
        caches
            .put(
                &config.static_cache_name(),
                CacheEntry::from_response(&CacheKey::get(&root), &shell),
            )
            .unwrap();

        let request = Request::navigate(url("http://localhost:3000/history"));
        let response = offline_response(&config, &caches, &request);
        assert!(response.from_cache);
        assert_eq!(response.text().unwrap(), "<html>app</html>");
    }
}
