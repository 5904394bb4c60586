//! Controller errors.

use rollcall_common::RollcallError;
use rollcall_idb::IdbError;
use rollcall_net::NetError;
use thiserror::Error;

/// Errors that can occur in controller operations.
///
/// None of these escape an event handler as a failure of the event; they
/// are logged, and the worst observable effect is an offline response or a
/// missing notification.
#[derive(Error, Debug, Clone)]
pub enum WorkerError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    #[error("State error: {0}")]
    State(String),

    #[error("Payload error: {0}")]
    Payload(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<NetError> for WorkerError {
    fn from(e: NetError) -> Self {
        Self::Network(e.to_string())
    }
}

impl From<IdbError> for WorkerError {
    fn from(e: IdbError) -> Self {
        match e {
            IdbError::NotFound(what) => Self::NotFound(what),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<WorkerError> for RollcallError {
    fn from(e: WorkerError) -> Self {
        match e {
            WorkerError::Network(message) => RollcallError::network(message),
            WorkerError::Cache(_) | WorkerError::QuotaExceeded { .. } => {
                RollcallError::cache(e.to_string())
            }
            WorkerError::State(message) => RollcallError::State(message),
            WorkerError::Payload(message) => RollcallError::payload(message),
            WorkerError::Config(message) => RollcallError::config(message),
            WorkerError::Client(message) => RollcallError::state(message),
            WorkerError::Storage(_) => RollcallError::storage_with_source("record store", e),
            WorkerError::NotFound(what) => RollcallError::NotFound(what),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_rollcall_error() {
        let err: RollcallError = WorkerError::QuotaExceeded {
            needed: 10,
            available: 2,
        }
        .into();
        assert_eq!(err.category(), "cache");

        let err: RollcallError = WorkerError::Network("offline".into()).into();
        assert!(err.is_retryable());

        let err: RollcallError = WorkerError::Payload("push body".into()).into();
        assert_eq!(err.category(), "payload");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_from_idb_not_found() {
        let err: WorkerError = IdbError::NotFound("attendance-db".into()).into();
        assert!(matches!(err, WorkerError::NotFound(_)));
    }
}
