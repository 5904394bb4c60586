//! The worker's global scope: configuration plus the host surfaces every
//! handler reaches through (`caches`, `clients`, the network), and the
//! channel on which the controller reports back to its host.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rollcall_net::Fetcher;
use serde_json::Value as JsonValue;
use tokio::sync::{mpsc, RwLock};
use tracing::trace;
use url::Url;

use crate::cache::CacheStorage;
use crate::clients::Clients;
use crate::lifecycle::WorkerState;
use crate::notification::NotificationId;
use crate::tasks::BackgroundTasks;
use crate::WorkerConfig;

/// Unique identifier for a worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Events the controller reports to its host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// Lifecycle state changed.
    StateChange {
        worker_id: WorkerId,
        new_state: WorkerState,
    },
    /// Open pages are now controlled by this worker.
    ClientsClaimed { count: usize },
    /// A notification was displayed.
    NotificationShown {
        id: NotificationId,
        title: String,
        primary_key: Option<JsonValue>,
    },
    /// A notification was closed.
    NotificationClosed { id: NotificationId },
    /// A new window was opened.
    WindowOpened { client_id: String, url: Url },
    /// An existing window was focused.
    WindowFocused { client_id: String },
    /// An existing window was navigated.
    WindowNavigated { client_id: String, url: Url },
    /// Managed caches were deleted on request.
    CachesCleared { names: Vec<String> },
}

/// Shared state handed to every component.
#[derive(Clone)]
pub struct WorkerScope {
    pub config: Arc<WorkerConfig>,
    pub caches: Arc<RwLock<CacheStorage>>,
    pub clients: Arc<RwLock<Clients>>,
    pub fetcher: Arc<dyn Fetcher>,
    pub tasks: BackgroundTasks,
    events: mpsc::UnboundedSender<HostEvent>,
}

impl WorkerScope {
    pub(crate) fn new(
        config: Arc<WorkerConfig>,
        caches: Arc<RwLock<CacheStorage>>,
        clients: Arc<RwLock<Clients>>,
        fetcher: Arc<dyn Fetcher>,
        events: mpsc::UnboundedSender<HostEvent>,
    ) -> Self {
        Self {
            config,
            caches,
            clients,
            fetcher,
            tasks: BackgroundTasks::new(),
            events,
        }
    }

    /// Report to the host. A host that stopped listening is not an error.
    pub fn emit(&self, event: HostEvent) {
        if self.events.send(event).is_err() {
            trace!("Host event receiver dropped");
        }
    }
}
