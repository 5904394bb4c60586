//! Background sync hooks.
//!
//! Nothing is transmitted yet. The hooks exist so the host can wake the
//! worker on connectivity changes; the bundled probe only reports how many
//! records are waiting in the local store.

use async_trait::async_trait;
use rollcall_idb::{IdbError, IdbFactory};
use tracing::{debug, info};

use crate::{SyncConfig, WorkerError};

/// What a sync run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Records waiting to be sent.
    pub pending: usize,
    /// Records actually sent.
    pub transmitted: usize,
}

/// Handler for sync and periodic-sync events.
#[async_trait]
pub trait SyncHandler: Send + Sync {
    /// One-off sync, fired once connectivity returns.
    async fn sync(&self, tag: &str) -> Result<SyncReport, WorkerError> {
        debug!(tag, "Sync requested, nothing to do");
        Ok(SyncReport::default())
    }

    /// Periodic refresh.
    async fn periodic_sync(&self, tag: &str) -> Result<SyncReport, WorkerError> {
        debug!(tag, "Periodic sync requested, nothing to do");
        Ok(SyncReport::default())
    }
}

/// Does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSync;

#[async_trait]
impl SyncHandler for NoopSync {}

/// Counts the records waiting in the local store and logs the result.
#[derive(Debug, Clone)]
pub struct PendingRecordsProbe {
    idb: IdbFactory,
    database: String,
    store: String,
}

impl PendingRecordsProbe {
    pub fn new(idb: IdbFactory, config: &SyncConfig) -> Self {
        Self {
            idb,
            database: config.database.clone(),
            store: config.store.clone(),
        }
    }

    async fn pending(&self) -> Result<usize, WorkerError> {
        match self.idb.count(&self.database, &self.store).await {
            Ok(count) => Ok(count),
            // Nothing recorded offline yet.
            Err(IdbError::NotFound(_)) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    async fn report(&self, tag: &str) -> Result<SyncReport, WorkerError> {
        let pending = self.pending().await?;
        info!(tag, pending, database = %self.database, store = %self.store, "Pending attendance records");
        Ok(SyncReport {
            pending,
            transmitted: 0,
        })
    }
}

#[async_trait]
impl SyncHandler for PendingRecordsProbe {
    async fn sync(&self, tag: &str) -> Result<SyncReport, WorkerError> {
        self.report(tag).await
    }

    async fn periodic_sync(&self, tag: &str) -> Result<SyncReport, WorkerError> {
        self.report(tag).await
    }
}
