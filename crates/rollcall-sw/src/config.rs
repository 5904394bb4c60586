//! Deployment configuration.
//!
//! A `WorkerConfig` is built once when the worker starts and shared as
//! `Arc<WorkerConfig>`; nothing mutates it afterwards. A new deployment
//! ships a new config with a new `version`, which names a new cache
//! generation.

use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::WorkerError;

/// Offline controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Cache generation identifier.
    pub version: String,

    /// Prefix for the managed cache names.
    pub cache_prefix: String,

    /// Origin the application is served from.
    pub origin: Url,

    /// Application root path, relative to `origin`.
    pub scope: String,

    /// App shell: paths and absolute URLs required for offline operation.
    pub app_shell: Vec<String>,

    /// URL schemes the interceptor never touches.
    pub excluded_schemes: Vec<String>,

    /// Cached documents served, in order, when a navigation fails offline.
    pub fallback_documents: Vec<String>,

    /// Store successful same-origin responses in the dynamic bucket.
    pub cache_dynamic: bool,

    /// Activate straight after install instead of waiting.
    pub skip_waiting: bool,

    /// Upper bound on bytes held across all caches.
    pub quota_bytes: Option<usize>,

    /// Notification defaults.
    pub notification: NotificationConfig,

    /// Background sync hooks.
    pub sync: SyncConfig,
}

/// Defaults used when a push message carries no (or partial) content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub default_title: String,
    pub default_body: String,
    pub icon: String,
    pub badge: String,
    /// Vibration pattern in milliseconds.
    pub vibrate: Vec<u32>,
}

/// Tags and local store consulted by the background sync hooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// One-off sync tag.
    pub sync_tag: String,
    /// Periodic sync tag.
    pub periodic_tag: String,
    /// Local database holding records not yet sent.
    pub database: String,
    /// Object store within `database`.
    pub store: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            version: "v2".to_string(),
            cache_prefix: "attendance".to_string(),
            origin: Url::parse("http://localhost:3000/").expect("static URL is valid"),
            scope: "/".to_string(),
            app_shell: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/manifest.json".to_string(),
                "/styles.css".to_string(),
                "/app.js".to_string(),
                "/icons/icon-192x192.png".to_string(),
                "/icons/icon-512x512.png".to_string(),
                "https://unpkg.com/html5-qrcode@2.3.8/html5-qrcode.min.js".to_string(),
                "https://cdn.jsdelivr.net/npm/chart.js".to_string(),
            ],
            excluded_schemes: vec![
                "chrome-extension".to_string(),
                "moz-extension".to_string(),
                "safari-web-extension".to_string(),
            ],
            fallback_documents: vec!["/".to_string(), "/index.html".to_string()],
            cache_dynamic: true,
            skip_waiting: true,
            quota_bytes: Some(50 * 1024 * 1024),
            notification: NotificationConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            default_title: "Attendance".to_string(),
            default_body: "You have a new attendance update".to_string(),
            icon: "/icons/icon-192x192.png".to_string(),
            badge: "/icons/icon-72x72.png".to_string(),
            vibrate: vec![100, 50, 100],
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_tag: "sync-attendance".to_string(),
            periodic_tag: "attendance-refresh".to_string(),
            database: "attendance-db".to_string(),
            store: "pending-records".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, WorkerError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| WorkerError::Config(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, WorkerError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| WorkerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Check the invariants the controller relies on.
    pub fn validate(&self) -> Result<(), WorkerError> {
        if self.version.trim().is_empty() {
            return Err(WorkerError::Config("version must not be empty".to_string()));
        }
        if self.cache_prefix.trim().is_empty() {
            return Err(WorkerError::Config("cache_prefix must not be empty".to_string()));
        }
        if !matches!(self.origin.scheme(), "http" | "https") {
            return Err(WorkerError::Config(format!(
                "origin must be http(s): {}",
                self.origin
            )));
        }
        if !self.scope.starts_with('/') {
            return Err(WorkerError::Config(format!(
                "scope must be an absolute path: {}",
                self.scope
            )));
        }
        self.shell_urls()?;
        for doc in &self.fallback_documents {
            self.resolve(doc)?;
        }
        Ok(())
    }

    /// Name of the static (app shell) bucket of this generation.
    pub fn static_cache_name(&self) -> String {
        format!("{}-static-{}", self.cache_prefix, self.version)
    }

    /// Name of the dynamic (learned) bucket of this generation.
    pub fn dynamic_cache_name(&self) -> String {
        format!("{}-dynamic-{}", self.cache_prefix, self.version)
    }

    /// Every cache name owned by this generation.
    pub fn managed_cache_names(&self) -> [String; 2] {
        [self.static_cache_name(), self.dynamic_cache_name()]
    }

    /// Resolve a path or absolute URL against the origin.
    pub fn resolve(&self, path_or_url: &str) -> Result<Url, WorkerError> {
        self.origin
            .join(path_or_url)
            .map_err(|e| WorkerError::Config(format!("bad URL {path_or_url}: {e}")))
    }

    /// The app shell resolved to absolute URLs, in manifest order.
    pub fn shell_urls(&self) -> Result<Vec<Url>, WorkerError> {
        self.app_shell.iter().map(|entry| self.resolve(entry)).collect()
    }

    /// Whether a URL is part of the app shell.
    pub fn is_shell_url(&self, url: &Url) -> bool {
        self.app_shell
            .iter()
            .filter_map(|entry| self.origin.join(entry).ok())
            .any(|shell| same_resource(&shell, url))
    }

    /// Whether a URL shares the application's origin.
    pub fn is_same_origin(&self, url: &Url) -> bool {
        self.origin.origin() == url.origin()
    }

    /// Whether the interceptor must leave this scheme alone.
    pub fn is_excluded_scheme(&self, url: &Url) -> bool {
        self.excluded_schemes
            .iter()
            .any(|scheme| scheme.eq_ignore_ascii_case(url.scheme()))
    }

    /// Application root URL.
    pub fn root_url(&self) -> Result<Url, WorkerError> {
        self.resolve(&self.scope)
    }

    /// Application root, optionally carrying `?action=<action>`.
    pub fn app_url(&self, action: Option<&str>) -> Result<Url, WorkerError> {
        let mut url = self.root_url()?;
        if let Some(action) = action {
            url.query_pairs_mut().append_pair("action", action);
        }
        Ok(url)
    }

    /// Whether a URL lies under the application root.
    pub fn in_scope(&self, url: &Url) -> bool {
        self.is_same_origin(url) && url.path().starts_with(&self.scope)
    }
}

/// URL identity for shell membership: fragments never matter.
fn same_resource(a: &Url, b: &Url) -> bool {
    let mut a = a.clone();
    let mut b = b.clone();
    a.set_fragment(None);
    b.set_fragment(None);
    a == b
}
