//! Fetch interception: cache first, then network, then offline fallback.

use http::{Method, StatusCode};
use rollcall_net::{Request, Response, ResponseType};
use tracing::{debug, trace, warn};

use crate::cache::{CacheEntry, CacheKey};
use crate::fallback;
use crate::scope::WorkerScope;
use crate::WorkerError;

/// What the worker does with an intercepted request.
#[derive(Debug, Clone)]
pub enum FetchDecision {
    /// Not handled; the host performs its default fetch with the request
    /// exactly as issued.
    PassThrough,
    /// Answer the page with this response.
    Respond(Response),
}

impl FetchDecision {
    /// The response, if the worker answered.
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchDecision::Respond(response) => Some(response),
            FetchDecision::PassThrough => None,
        }
    }
}

/// Per-request cache-first strategy. Holds no per-request state.
pub struct FetchInterceptor {
    scope: WorkerScope,
}

impl FetchInterceptor {
    pub(crate) fn new(scope: WorkerScope) -> Self {
        Self { scope }
    }

    /// Whether the worker should answer this request at all.
    pub fn should_handle(&self, request: &Request) -> bool {
        let config = &self.scope.config;

        if request.method != Method::GET {
            trace!(url = %request.url, method = %request.method, "Passing through non-GET");
            return false;
        }
        if config.is_excluded_scheme(&request.url) {
            trace!(url = %request.url, "Passing through excluded scheme");
            return false;
        }
        if !config.is_same_origin(&request.url) && !config.is_shell_url(&request.url) {
            trace!(url = %request.url, "Passing through cross-origin request");
            return false;
        }
        true
    }

    /// Handle one fetch event. Never fails: network errors become fallbacks.
    pub async fn handle(&self, request: &Request) -> FetchDecision {
        if !self.should_handle(request) {
            return FetchDecision::PassThrough;
        }

        let key = CacheKey::for_request(request);

        if let Some(response) = self.lookup(&key).await {
            debug!(url = %request.url, "Cache hit");
            return FetchDecision::Respond(response);
        }

        match self.scope.fetcher.fetch(request).await {
            Ok(response) => {
                debug!(url = %request.url, status = %response.status, "Cache miss, served from network");
                self.write_back(request, key, &response);
                FetchDecision::Respond(response)
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "Network failed, serving offline fallback");
                let caches = self.scope.caches.read().await;
                FetchDecision::Respond(fallback::offline_response(
                    &self.scope.config,
                    &caches,
                    request,
                ))
            }
        }
    }

    async fn lookup(&self, key: &CacheKey) -> Option<Response> {
        let caches = self.scope.caches.read().await;
        let entry = caches.match_request(key)?;
        match entry.to_response() {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(url = %key.url, error = %e, "Ignoring unreadable cache entry");
                None
            }
        }
    }

    /// Store a snapshot of a cacheable response without holding up the
    /// page. Failures only show up in the log.
    fn write_back(&self, request: &Request, key: CacheKey, response: &Response) {
        let config = &self.scope.config;
        let in_shell = config.is_shell_url(&request.url);

        if !is_cacheable(response, in_shell) {
            trace!(url = %key.url, status = %response.status, "Response not cacheable");
            return;
        }

        let bucket = if in_shell {
            config.static_cache_name()
        } else if config.cache_dynamic {
            config.dynamic_cache_name()
        } else {
            return;
        };

        let entry = CacheEntry::from_response(&key, response);
        let caches = self.scope.caches.clone();
        self.scope.tasks.spawn("cache-write-back", async move {
            caches.write().await.put(&bucket, entry)?;
            trace!(cache = %bucket, "Stored response");
            Ok::<(), WorkerError>(())
        });
    }
}

/// Only complete, successful responses are stored: status 200 and either a
/// same-origin (basic) response or an explicitly listed shell resource.
pub fn is_cacheable(response: &Response, in_shell: bool) -> bool {
    response.status == StatusCode::OK
        && response.response_type != ResponseType::Opaque
        && response.response_type != ResponseType::Error
        && (response.response_type == ResponseType::Basic || in_shell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn response(status: StatusCode, response_type: ResponseType) -> Response {
        Response::new(Url::parse("https://example.com/a").unwrap(), status).with_type(response_type)
    }

    #[test]
    fn test_cacheable_rules() {
        assert!(is_cacheable(&response(StatusCode::OK, ResponseType::Basic), false));
        assert!(is_cacheable(&response(StatusCode::OK, ResponseType::Cors), true));
        assert!(!is_cacheable(&response(StatusCode::OK, ResponseType::Cors), false));
        assert!(!is_cacheable(&response(StatusCode::OK, ResponseType::Opaque), true));
        assert!(!is_cacheable(&response(StatusCode::NOT_FOUND, ResponseType::Basic), false));
        assert!(!is_cacheable(&response(StatusCode::NO_CONTENT, ResponseType::Basic), false));
    }
}
