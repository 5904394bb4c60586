//! Shared fixtures: a scripted network and small worker configs.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::{header, HeaderValue, StatusCode};
use rollcall_net::{Fetcher, NetError, Request, Response, ResponseType};
use rollcall_sw::{HostEvent, OfflineWorker, WorkerConfig};
use tokio::sync::mpsc;
use url::Url;

pub const ORIGIN: &str = "http://localhost:3000/";

#[derive(Clone)]
struct Route {
    status: StatusCode,
    content_type: &'static str,
    body: Bytes,
}

/// In-memory network. Unknown URLs answer 404; `go_offline` makes every
/// fetch fail.
pub struct FakeNetwork {
    routes: Mutex<HashMap<String, Route>>,
    online: AtomicBool,
    log: Mutex<Vec<String>>,
}

impl FakeNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(HashMap::new()),
            online: AtomicBool::new(true),
            log: Mutex::new(Vec::new()),
        })
    }

    /// Serve `body` at `url` (absolute, or a path on the app origin).
    pub fn serve(&self, url: &str, status: u16, content_type: &'static str, body: &str) {
        let url = url_of(url);
        self.routes.lock().unwrap().insert(
            url.to_string(),
            Route {
                status: StatusCode::from_u16(status).unwrap(),
                content_type,
                body: Bytes::copy_from_slice(body.as_bytes()),
            },
        );
    }

    /// Serve the three-entry shell used by `small_config`.
    pub fn serve_small_shell(&self) {
        self.serve("/", 200, "text/html", "<html>root</html>");
        self.serve("/index.html", 200, "text/html", "<html>index</html>");
        self.serve("/manifest.json", 200, "application/json", r#"{"name":"Attendance"}"#);
    }

    pub fn go_offline(&self) {
        self.online.store(false, Ordering::SeqCst);
    }

    pub fn go_online(&self) {
        self.online.store(true, Ordering::SeqCst);
    }

    /// Number of fetches attempted so far.
    pub fn calls(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    /// Number of fetches attempted for one URL.
    pub fn calls_to(&self, url: &str) -> usize {
        let url = url_of(url).to_string();
        self.log.lock().unwrap().iter().filter(|u| **u == url).count()
    }
}

#[async_trait]
impl Fetcher for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetError> {
        self.log.lock().unwrap().push(request.url.to_string());

        if !self.online.load(Ordering::SeqCst) {
            return Err(NetError::RequestFailed(format!("{}: offline", request.url)));
        }

        let route = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
        let response_type = if request.url.origin() == url_of(ORIGIN).origin() {
            ResponseType::Basic
        } else {
            ResponseType::Cors
        };

        Ok(match route {
            Some(route) => Response::new(request.url.clone(), route.status)
                .with_type(response_type)
                .with_header(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(route.content_type),
                )
                .with_header(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("max-age=60"),
                )
                .with_body(route.body),
            None => Response::new(request.url.clone(), StatusCode::NOT_FOUND).with_type(response_type),
        })
    }
}

/// Absolute URL for a path on the app origin, or an absolute URL as is.
pub fn url_of(path_or_url: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path_or_url).unwrap()
}

/// Default config with a three-entry shell.
pub fn small_config() -> WorkerConfig {
    WorkerConfig {
        app_shell: vec![
            "/".to_string(),
            "/index.html".to_string(),
            "/manifest.json".to_string(),
        ],
        ..WorkerConfig::default()
    }
}

/// Route worker logs to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("rollcall_sw=debug")
        .with_test_writer()
        .try_init();
}

pub fn worker(
    config: WorkerConfig,
    network: &Arc<FakeNetwork>,
) -> (OfflineWorker, mpsc::UnboundedReceiver<HostEvent>) {
    init_tracing();
    OfflineWorker::new(config, network.clone()).unwrap()
}

/// Everything the worker has reported so far.
pub fn drain(events: &mut mpsc::UnboundedReceiver<HostEvent>) -> Vec<HostEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}
