//! Install and activate.
//!
//! ```text
//! Parsed ──install──▶ Installing ──▶ Installed ──activate──▶ Activating ──▶ Activated
//!                                        ▲                                      │
//!                              (waits unless skip_waiting)          (stale generations gone,
//!                                                                    open pages claimed)
//! ```
//!
//! A failed app-shell download during install is logged and the worker still
//! reaches `Installed`; pages then simply get fewer cache hits.

use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;
use rollcall_net::Request;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, CacheKey};
use crate::scope::{HostEvent, WorkerId, WorkerScope};
use crate::WorkerError;

/// Worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WorkerState {
    /// Script evaluated, nothing run yet.
    #[default]
    Parsed,
    /// Install event in progress.
    Installing,
    /// Installed, waiting for activation.
    Installed,
    /// Activate event in progress.
    Activating,
    /// Active and controlling pages.
    Activated,
    /// Replaced by a newer worker.
    Redundant,
}

/// Outcome of the install event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Shell entries stored.
    pub precached: usize,
    /// Why pre-population failed, if it did.
    pub failure: Option<String>,
    /// Whether activation should follow immediately.
    pub activate_now: bool,
}

/// Outcome of the activate event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateReport {
    /// Cache names deleted as stale.
    pub deleted: Vec<String>,
    /// Pages newly claimed.
    pub claimed: usize,
}

/// Drives a single worker instance through its lifecycle.
pub struct Lifecycle {
    scope: WorkerScope,
    id: WorkerId,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
}

impl Lifecycle {
    pub(crate) fn new(scope: WorkerScope) -> Self {
        Self {
            scope,
            id: WorkerId::new(),
            state: RwLock::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
        }
    }

    /// This worker's ID.
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Current state.
    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Whether the worker asked to skip the waiting phase.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    async fn transition(&self, from: &[WorkerState], to: WorkerState) -> Result<(), WorkerError> {
        let mut state = self.state.write().await;
        if !from.contains(&*state) {
            return Err(WorkerError::State(format!(
                "cannot move from {:?} to {:?}",
                *state, to
            )));
        }
        *state = to;
        drop(state);

        debug!(worker = self.id.raw(), state = ?to, "Lifecycle transition");
        self.scope.emit(HostEvent::StateChange {
            worker_id: self.id,
            new_state: to,
        });
        Ok(())
    }

    /// Handle the install event.
    pub async fn install(&self) -> Result<InstallReport, WorkerError> {
        self.transition(&[WorkerState::Parsed], WorkerState::Installing)
            .await?;

        let (precached, failure) = match self.precache().await {
            Ok(count) => {
                info!(count, cache = %self.scope.config.static_cache_name(), "App shell cached");
                (count, None)
            }
            Err(e) => {
                warn!(error = %e, "App shell pre-population failed");
                (0, Some(e.to_string()))
            }
        };

        if self.scope.config.skip_waiting {
            self.skip_waiting.store(true, Ordering::SeqCst);
        }

        self.transition(&[WorkerState::Installing], WorkerState::Installed)
            .await?;

        Ok(InstallReport {
            precached,
            failure,
            activate_now: self.skip_waiting_requested(),
        })
    }

    /// Handle the activate event.
    pub async fn activate(&self) -> Result<ActivateReport, WorkerError> {
        self.transition(&[WorkerState::Installed], WorkerState::Activating)
            .await?;

        let deleted = self.evict_stale_generations().await;

        let config = &self.scope.config;
        let claimed = self
            .scope
            .clients
            .write()
            .await
            .claim(|url| config.in_scope(url));
        info!(claimed, "Clients claimed");
        self.scope.emit(HostEvent::ClientsClaimed { count: claimed });

        self.transition(&[WorkerState::Activating], WorkerState::Activated)
            .await?;

        Ok(ActivateReport { deleted, claimed })
    }

    /// Skip the waiting phase. An installed worker activates right away; an
    /// installing one activates as soon as install finishes; an active one
    /// is unaffected.
    pub async fn skip_waiting(&self) -> Result<Option<ActivateReport>, WorkerError> {
        self.skip_waiting.store(true, Ordering::SeqCst);
        match self.state().await {
            WorkerState::Installed => self.activate().await.map(Some),
            _ => Ok(None),
        }
    }

    /// Mark this worker as replaced.
    pub async fn retire(&self) {
        *self.state.write().await = WorkerState::Redundant;
        self.scope.emit(HostEvent::StateChange {
            worker_id: self.id,
            new_state: WorkerState::Redundant,
        });
    }

    /// Download the app shell and store it, all or nothing.
    pub async fn precache(&self) -> Result<usize, WorkerError> {
        let urls = self.scope.config.shell_urls()?;
        let fetcher = &self.scope.fetcher;

        let requests: Vec<Request> = urls.into_iter().map(Request::get).collect();
        let results = join_all(requests.iter().map(|r| fetcher.fetch(r))).await;

        let mut entries = Vec::with_capacity(requests.len());
        let mut failures = Vec::new();
        for (request, result) in requests.iter().zip(results) {
            match result {
                Ok(response) if response.ok() => {
                    entries.push(CacheEntry::from_response(
                        &CacheKey::for_request(request),
                        &response,
                    ));
                }
                Ok(response) => failures.push(format!("{} ({})", request.url, response.status)),
                Err(e) => failures.push(format!("{} ({e})", request.url)),
            }
        }

        if !failures.is_empty() {
            return Err(WorkerError::Network(format!(
                "failed to fetch {}",
                failures.join(", ")
            )));
        }

        let count = entries.len();
        self.scope
            .caches
            .write()
            .await
            .put_all(&self.scope.config.static_cache_name(), entries)?;
        Ok(count)
    }

    /// Delete every cache not owned by the current generation.
    async fn evict_stale_generations(&self) -> Vec<String> {
        let keep = self.scope.config.managed_cache_names();
        let mut caches = self.scope.caches.write().await;

        let stale: Vec<String> = caches
            .keys()
            .into_iter()
            .filter(|name| !keep.iter().any(|k| k.as_str() == *name))
            .map(str::to_string)
            .collect();

        for name in &stale {
            info!(cache = %name, "Deleting stale cache");
            caches.delete(name);
        }
        stale
    }

    /// Delete the current generation's caches. Absent caches are skipped.
    pub async fn clear_managed(&self) -> Vec<String> {
        let mut caches = self.scope.caches.write().await;
        self.scope
            .config
            .managed_cache_names()
            .into_iter()
            .filter(|name| caches.delete(name))
            .collect()
    }
}
