//! The offline controller: one worker instance and its event dispatch.

use std::sync::Arc;

use bytes::Bytes;
use rollcall_net::{Fetcher, Request};
use serde_json::Value as JsonValue;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, info, instrument, trace, warn};

use crate::cache::CacheStorage;
use crate::clients::{Client, Clients};
use crate::control::{ControlMessage, ControlReply, VersionInfo};
use crate::fetch::{FetchDecision, FetchInterceptor};
use crate::lifecycle::{ActivateReport, InstallReport, Lifecycle, WorkerState};
use crate::notification::{NotificationCenter, NotificationId, NotificationResponder};
use crate::scope::{HostEvent, WorkerId, WorkerScope};
use crate::sync::{NoopSync, SyncHandler, SyncReport};
use crate::{WorkerConfig, WorkerError};

/// Events the host delivers to the worker.
#[derive(Debug)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    Push {
        data: Option<Bytes>,
    },
    NotificationClick {
        notification: NotificationId,
        action: Option<String>,
    },
    NotificationClose {
        notification: NotificationId,
    },
    Message {
        data: JsonValue,
        reply: Option<oneshot::Sender<ControlReply>>,
    },
    Sync {
        tag: String,
    },
    PeriodicSync {
        tag: String,
    },
}

impl WorkerEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Activate => "activate",
            Self::Fetch(_) => "fetch",
            Self::Push { .. } => "push",
            Self::NotificationClick { .. } => "notificationclick",
            Self::NotificationClose { .. } => "notificationclose",
            Self::Message { .. } => "message",
            Self::Sync { .. } => "sync",
            Self::PeriodicSync { .. } => "periodicsync",
        }
    }
}

/// Result of dispatching one event.
#[derive(Debug)]
pub enum EventOutcome {
    Installed {
        report: InstallReport,
        /// Present when install went straight on to activation.
        activated: Option<ActivateReport>,
    },
    Activated(ActivateReport),
    Fetch(FetchDecision),
    NotificationShown(Option<NotificationId>),
    Window(Option<Client>),
    Synced(SyncReport),
    Handled,
    /// The event was valid but not meant for this worker.
    Ignored,
    Rejected(WorkerError),
}

/// An offline cache controller instance.
pub struct OfflineWorker {
    scope: WorkerScope,
    lifecycle: Lifecycle,
    interceptor: FetchInterceptor,
    notifications: NotificationResponder,
    sync: Arc<dyn SyncHandler>,
}

impl OfflineWorker {
    /// Create a worker. Host events arrive on the returned receiver.
    pub fn new(
        config: WorkerConfig,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<HostEvent>), WorkerError> {
        config.validate()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let caches = Arc::new(RwLock::new(CacheStorage::with_quota(config.quota_bytes)));
        let clients = Arc::new(RwLock::new(Clients::new()));
        let scope = WorkerScope::new(Arc::new(config), caches, clients, fetcher, events_tx);

        info!(
            version = %scope.config.version,
            origin = %scope.config.origin,
            "Offline worker created"
        );
        Ok((Self::assemble(scope, Arc::new(NoopSync)), events_rx))
    }

    fn assemble(scope: WorkerScope, sync: Arc<dyn SyncHandler>) -> Self {
        Self {
            lifecycle: Lifecycle::new(scope.clone()),
            interceptor: FetchInterceptor::new(scope.clone()),
            notifications: NotificationResponder::new(scope.clone()),
            scope,
            sync,
        }
    }

    /// Share cache storage with other workers (an earlier generation, say).
    /// Call before any event is dispatched.
    pub fn with_caches(mut self, caches: Arc<RwLock<CacheStorage>>) -> Self {
        self.scope.caches = caches;
        Self::assemble(self.scope, self.sync)
    }

    /// Share the open pages with other workers. Call before any event is
    /// dispatched.
    pub fn with_clients(mut self, clients: Arc<RwLock<Clients>>) -> Self {
        self.scope.clients = clients;
        Self::assemble(self.scope, self.sync)
    }

    /// Replace the background sync handler.
    pub fn with_sync_handler(mut self, handler: Arc<dyn SyncHandler>) -> Self {
        self.sync = handler;
        self
    }

    /// Deliver one event.
    #[instrument(skip_all, fields(worker = self.lifecycle.id().raw(), event = event.name()))]
    pub async fn dispatch(&self, event: WorkerEvent) -> EventOutcome {
        match event {
            WorkerEvent::Install => match self.install().await {
                Ok((report, activated)) => EventOutcome::Installed { report, activated },
                Err(e) => reject(e),
            },
            WorkerEvent::Activate => match self.lifecycle.activate().await {
                Ok(report) => EventOutcome::Activated(report),
                Err(e) => reject(e),
            },
            WorkerEvent::Fetch(request) => EventOutcome::Fetch(self.handle_fetch(&request).await),
            WorkerEvent::Push { data } => {
                let shown = self.notifications.on_push(data.as_deref()).await;
                EventOutcome::NotificationShown(shown.map(|n| n.id))
            }
            WorkerEvent::NotificationClick {
                notification,
                action,
            } => match self
                .notifications
                .on_click(notification, action.as_deref())
                .await
            {
                Ok(window) => EventOutcome::Window(window),
                Err(e) => reject(e),
            },
            WorkerEvent::NotificationClose { notification } => {
                self.notifications.on_close(notification).await;
                EventOutcome::Handled
            }
            WorkerEvent::Message { data, reply } => self.handle_message(data, reply).await,
            WorkerEvent::Sync { tag } => self.handle_sync(&tag, false).await,
            WorkerEvent::PeriodicSync { tag } => self.handle_sync(&tag, true).await,
        }
    }

    /// Install, then activate at once if waiting is skipped.
    pub async fn start(&self) -> Result<(InstallReport, Option<ActivateReport>), WorkerError> {
        self.install().await
    }

    async fn install(&self) -> Result<(InstallReport, Option<ActivateReport>), WorkerError> {
        let report = self.lifecycle.install().await?;
        let activated = if report.activate_now {
            Some(self.lifecycle.activate().await?)
        } else {
            None
        };
        Ok((report, activated))
    }

    /// Answer a page request.
    pub async fn handle_fetch(&self, request: &Request) -> FetchDecision {
        self.interceptor.handle(request).await
    }

    async fn handle_message(
        &self,
        data: JsonValue,
        reply: Option<oneshot::Sender<ControlReply>>,
    ) -> EventOutcome {
        let Some(message) = ControlMessage::parse(&data) else {
            debug!(message = %data, "Ignoring unrecognized message");
            send_reply(reply, ControlReply::ok());
            return EventOutcome::Ignored;
        };

        info!(?message, "Control message");
        let result = match message {
            ControlMessage::SkipWaiting => self.lifecycle.skip_waiting().await.map(|activated| {
                if let Some(report) = activated {
                    debug!(deleted = report.deleted.len(), "Activated on request");
                }
                ControlReply::ok()
            }),
            ControlMessage::UpdateCache => self.lifecycle.precache().await.map(|count| {
                info!(count, "App shell refreshed");
                ControlReply::ok()
            }),
            ControlMessage::ClearCache => {
                let names = self.lifecycle.clear_managed().await;
                info!(?names, "Managed caches cleared");
                self.scope.emit(HostEvent::CachesCleared { names });
                Ok(ControlReply::ok())
            }
            ControlMessage::GetVersion => Ok(ControlReply::Version(self.version_info())),
        };

        match result {
            Ok(answer) => {
                send_reply(reply, answer);
                EventOutcome::Handled
            }
            Err(e) => {
                warn!(?message, error = %e, "Control message failed");
                send_reply(reply, ControlReply::failed(e.to_string()));
                EventOutcome::Rejected(e)
            }
        }
    }

    async fn handle_sync(&self, tag: &str, periodic: bool) -> EventOutcome {
        let sync = &self.scope.config.sync;
        let result = match (periodic, tag) {
            (false, t) if t == sync.sync_tag => self.sync.sync(tag).await,
            (true, t) if t == sync.periodic_tag => self.sync.periodic_sync(tag).await,
            _ => {
                debug!(tag, periodic, "Ignoring unknown sync tag");
                return EventOutcome::Ignored;
            }
        };
        match result {
            Ok(report) => EventOutcome::Synced(report),
            Err(e) => reject(e),
        }
    }

    /// Cache generation and app shell, as reported to `GET_VERSION`.
    pub fn version_info(&self) -> VersionInfo {
        VersionInfo {
            version: self.scope.config.version.clone(),
            cached: self.scope.config.app_shell.clone(),
        }
    }

    /// Mark this worker as replaced by a newer one.
    pub async fn retire(&self) {
        self.lifecycle.retire().await;
    }

    /// Wait for outstanding background work (cache write-backs).
    pub async fn settle(&self) {
        self.scope.tasks.settle().await;
    }

    pub fn id(&self) -> WorkerId {
        self.lifecycle.id()
    }

    pub async fn state(&self) -> WorkerState {
        self.lifecycle.state().await
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.scope.config
    }

    pub fn caches(&self) -> Arc<RwLock<CacheStorage>> {
        Arc::clone(&self.scope.caches)
    }

    pub fn clients(&self) -> Arc<RwLock<Clients>> {
        Arc::clone(&self.scope.clients)
    }

    pub fn notifications(&self) -> Arc<RwLock<NotificationCenter>> {
        self.notifications.center()
    }
}

fn reject(e: WorkerError) -> EventOutcome {
    warn!(error = %e, "Event handler failed");
    EventOutcome::Rejected(e)
}

fn send_reply(reply: Option<oneshot::Sender<ControlReply>>, answer: ControlReply) {
    if let Some(reply) = reply {
        if reply.send(answer).is_err() {
            trace!("Reply receiver dropped");
        }
    }
}
