//! # Rollcall Offline Worker
//!
//! Offline cache controller for the Rollcall attendance app. It sits
//! between the app's pages and the network, keeps the app shell available
//! offline, and turns push messages into notifications.
//!
//! ## Features
//!
//! - **Lifecycle**: install pre-populates the app shell, activate evicts
//!   stale cache generations and claims open pages
//! - **Fetch Interception**: cache first, network second, write-back of
//!   successful responses
//! - **Offline Fallbacks**: cached root document, offline page, placeholder
//!   image, or a `503` JSON body
//! - **Notifications**: push display with check-in/check-out actions
//! - **Control Channel**: `SKIP_WAITING`, `UPDATE_CACHE`, `CLEAR_CACHE`,
//!   `GET_VERSION`
//!
//! ## Architecture
//!
//! ```text
//! OfflineWorker ── dispatch(WorkerEvent) ──▶ EventOutcome
//!     │
//!     ├── Lifecycle             install / activate / skip_waiting
//!     ├── FetchInterceptor      cache → network → fallback
//!     ├── NotificationResponder push / click / close
//!     ├── SyncHandler           sync / periodic sync
//!     │
//!     └── WorkerScope
//!             ├── WorkerConfig  (Arc, immutable)
//!             ├── CacheStorage  {prefix}-static-{v}, {prefix}-dynamic-{v}
//!             ├── Clients
//!             ├── Fetcher
//!             └── HostEvent channel ──▶ host
//! ```

pub mod cache;
pub mod clients;
pub mod config;
pub mod control;
pub mod error;
pub mod fallback;
pub mod fetch;
pub mod lifecycle;
pub mod notification;
pub mod scope;
pub mod sync;
pub mod tasks;
pub mod worker;

pub use cache::{Cache, CacheEntry, CacheKey, CacheStorage};
pub use clients::{Client, ClientMatchOptions, ClientType, Clients, VisibilityState};
pub use config::{NotificationConfig, SyncConfig, WorkerConfig};
pub use control::{ControlMessage, ControlReply, VersionInfo};
pub use error::WorkerError;
pub use fallback::OFFLINE_HEADER;
pub use fetch::{FetchDecision, FetchInterceptor};
pub use lifecycle::{ActivateReport, InstallReport, WorkerState};
pub use notification::{
    ClickAction, Notification, NotificationAction, NotificationCenter, NotificationId,
    PushPayload,
};
pub use scope::{HostEvent, WorkerId, WorkerScope};
pub use sync::{NoopSync, PendingRecordsProbe, SyncHandler, SyncReport};
pub use tasks::BackgroundTasks;
pub use worker::{EventOutcome, OfflineWorker, WorkerEvent};
