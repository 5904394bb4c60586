//! Network access.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, trace};
use url::Url;

use crate::{NetError, Request, Response, ResponseType};

/// Something that can perform a network request.
///
/// Implementations return `Err` only for transport failures. HTTP error
/// statuses are successful fetches.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, NetError>;
}

/// Loader configuration.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// User agent string.
    pub user_agent: String,
    /// Per-request timeout. A timeout is reported as an ordinary failure.
    pub timeout: Duration,
    /// Maximum redirects.
    pub max_redirects: usize,
    /// Origin the requests are made on behalf of. Responses from other
    /// origins are typed as CORS responses.
    pub origin: Option<Url>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("Rollcall/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(30),
            max_redirects: 10,
            origin: None,
        }
    }
}

/// `reqwest`-backed fetcher.
pub struct HttpFetcher {
    client: reqwest::Client,
    config: LoaderConfig,
}

impl HttpFetcher {
    /// Create a new fetcher.
    pub fn new(config: LoaderConfig) -> Result<Self, NetError> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        info!(origin = ?config.origin.as_ref().map(Url::as_str), "HttpFetcher initialized");

        Ok(Self { client, config })
    }

    fn response_type(&self, url: &Url) -> ResponseType {
        match &self.config.origin {
            Some(origin) if origin.origin() != url.origin() => ResponseType::Cors,
            _ => ResponseType::Basic,
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, NetError> {
        debug!(url = %request.url, method = %request.method, "Fetching resource");

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await?;

        trace!(
            url = %url,
            status = %status,
            body_len = body.len(),
            "Response received"
        );

        Ok(Response {
            response_type: self.response_type(&url),
            url,
            status,
            headers,
            body,
            from_cache: false,
        })
    }
}
