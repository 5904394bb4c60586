//! Cache Storage: named buckets of request → response snapshots.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use hashbrown::HashMap;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use rollcall_net::{Request, Response, ResponseType};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::WorkerError;

/// Request identity inside a cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub method: String,
    pub url: String,
}

impl CacheKey {
    /// Key for a GET of `url`.
    pub fn get(url: &Url) -> Self {
        Self {
            method: Method::GET.to_string(),
            url: strip_fragment(url),
        }
    }

    /// Key for a request.
    pub fn for_request(request: &Request) -> Self {
        Self {
            method: request.method.to_string(),
            url: strip_fragment(&request.url),
        }
    }
}

fn strip_fragment(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

/// A cached request/response pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request URL.
    pub url: String,

    /// Request method.
    pub method: String,

    /// Response status.
    pub status: u16,

    /// Response headers, in wire order. Values are kept as raw bytes.
    pub headers: Vec<(String, Bytes)>,

    /// Response body.
    pub body: Bytes,

    /// Response type at the time it was stored.
    pub response_type: ResponseType,

    /// Cached at timestamp (ms since epoch).
    pub cached_at: u64,
}

impl CacheEntry {
    /// Snapshot a response. The response itself is left untouched.
    pub fn from_response(key: &CacheKey, response: &Response) -> Self {
        Self {
            url: key.url.clone(),
            method: key.method.clone(),
            status: response.status.as_u16(),
            headers: response
                .headers
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_string(),
                        Bytes::copy_from_slice(value.as_bytes()),
                    )
                })
                .collect(),
            body: response.body.clone(),
            response_type: response.response_type,
            cached_at: now_millis(),
        }
    }

    /// Cache key of this entry.
    pub fn key(&self) -> CacheKey {
        CacheKey {
            method: self.method.clone(),
            url: self.url.clone(),
        }
    }

    /// Rebuild a response from the snapshot.
    pub fn to_response(&self) -> Result<Response, WorkerError> {
        let url = Url::parse(&self.url)
            .map_err(|e| WorkerError::Cache(format!("stored URL {}: {e}", self.url)))?;
        let status = StatusCode::from_u16(self.status)
            .map_err(|e| WorkerError::Cache(format!("stored status {}: {e}", self.status)))?;

        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| WorkerError::Cache(format!("stored header {name}: {e}")))?;
            let value = HeaderValue::from_bytes(value)
                .map_err(|e| WorkerError::Cache(format!("stored header value: {e}")))?;
            headers.append(name, value);
        }

        Ok(Response {
            url,
            status,
            headers,
            body: self.body.clone(),
            response_type: self.response_type,
            from_cache: true,
        })
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// ==================== Cache ====================

/// A cache instance.
#[derive(Debug, Default)]
pub struct Cache {
    /// Cache name.
    pub name: String,

    entries: HashMap<CacheKey, CacheEntry>,
}

impl Cache {
    /// Create a new cache.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Match a request.
    pub fn match_request(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Add entry, replacing any previous one for the same key.
    pub fn put(&mut self, entry: CacheEntry) {
        self.entries.insert(entry.key(), entry);
    }

    /// Delete entry.
    pub fn delete(&mut self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<&CacheKey> {
        let mut keys: Vec<_> = self.entries.keys().collect();
        keys.sort();
        keys
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Body bytes held.
    pub fn size_bytes(&self) -> usize {
        self.entries.values().map(|e| e.body.len()).sum()
    }

    fn replaced_bytes(&self, key: &CacheKey) -> usize {
        self.entries.get(key).map(|e| e.body.len()).unwrap_or(0)
    }
}

// ==================== Cache Storage ====================

/// Cache storage (the `caches` global).
#[derive(Debug, Default)]
pub struct CacheStorage {
    caches: HashMap<String, Cache>,
    quota_bytes: Option<usize>,
}

impl CacheStorage {
    /// Create new unbounded cache storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create cache storage holding at most `quota_bytes` of bodies.
    pub fn with_quota(quota_bytes: Option<usize>) -> Self {
        Self {
            caches: HashMap::new(),
            quota_bytes,
        }
    }

    /// Open a cache (creates if doesn't exist).
    pub fn open(&mut self, name: &str) -> &mut Cache {
        self.caches
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name))
    }

    /// Get a cache without creating it.
    pub fn get(&self, name: &str) -> Option<&Cache> {
        self.caches.get(name)
    }

    /// Check if cache exists.
    pub fn has(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Delete a cache. Returns whether it existed.
    pub fn delete(&mut self, name: &str) -> bool {
        self.caches.remove(name).is_some()
    }

    /// All cache names, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.caches.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Match across all caches, in name order.
    pub fn match_request(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.keys()
            .into_iter()
            .filter_map(|name| self.caches.get(name))
            .find_map(|cache| cache.match_request(key))
    }

    /// Body bytes held across every cache.
    pub fn usage_bytes(&self) -> usize {
        self.caches.values().map(Cache::size_bytes).sum()
    }

    /// Store one entry in the named cache, subject to quota.
    pub fn put(&mut self, cache_name: &str, entry: CacheEntry) -> Result<(), WorkerError> {
        let replaced = self
            .caches
            .get(cache_name)
            .map(|c| c.replaced_bytes(&entry.key()))
            .unwrap_or(0);
        self.check_quota(entry.body.len(), replaced)?;
        self.open(cache_name).put(entry);
        Ok(())
    }

    /// Store every entry or none of them.
    pub fn put_all(&mut self, cache_name: &str, entries: Vec<CacheEntry>) -> Result<(), WorkerError> {
        let (needed, replaced) = match self.caches.get(cache_name) {
            Some(cache) => entries.iter().fold((0, 0), |(n, r), e| {
                (n + e.body.len(), r + cache.replaced_bytes(&e.key()))
            }),
            None => (entries.iter().map(|e| e.body.len()).sum(), 0),
        };
        self.check_quota(needed, replaced)?;

        let cache = self.open(cache_name);
        for entry in entries {
            cache.put(entry);
        }
        Ok(())
    }

    fn check_quota(&self, needed: usize, replaced: usize) -> Result<(), WorkerError> {
        let Some(quota) = self.quota_bytes else {
            return Ok(());
        };
        let available = quota.saturating_sub(self.usage_bytes().saturating_sub(replaced));
        if needed > available {
            return Err(WorkerError::QuotaExceeded { needed, available });
        }
        Ok(())
    }
}
