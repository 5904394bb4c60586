//! Control messages posted to the worker by pages.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A recognized control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate immediately instead of waiting.
    SkipWaiting,
    /// Re-download the app shell into the current generation.
    UpdateCache,
    /// Delete the current generation's caches.
    ClearCache,
    /// Report the cache generation and the shell list.
    GetVersion,
}

impl ControlMessage {
    /// Interpret a posted message. Objects are read directly, strings are
    /// read as JSON text. Anything without a known `type` field is not a
    /// control message.
    pub fn parse(data: &JsonValue) -> Option<Self> {
        match data {
            JsonValue::String(text) => serde_json::from_str(text).ok(),
            other => Self::deserialize(other).ok(),
        }
    }
}

/// `GET_VERSION` answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub cached: Vec<String>,
}

/// Reply delivered over a message's reply channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlReply {
    Version(VersionInfo),
    Ack {
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl ControlReply {
    pub fn ok() -> Self {
        Self::Ack { ok: true, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Ack {
            ok: false,
            error: Some(error.into()),
        }
    }
}
