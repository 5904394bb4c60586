//! Push notifications: display on push, route clicks to an app window.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::clients::{Client, ClientMatchOptions, ClientType};
use crate::scope::{HostEvent, WorkerScope};
use crate::{NotificationConfig, WorkerError};

/// Unique identifier for a displayed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationId(u64);

impl NotificationId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A button on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl NotificationAction {
    fn new(action: &str, title: &str) -> Self {
        Self {
            action: action.to_string(),
            title: title.to_string(),
            icon: None,
        }
    }
}

/// Push message content. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub tag: Option<String>,
    pub primary_key: Option<JsonValue>,
    pub actions: Option<Vec<NotificationAction>>,
}

impl PushPayload {
    /// Parse push data. No data (or only whitespace) means "use defaults";
    /// anything else must be a JSON object.
    pub fn parse(data: Option<&[u8]>) -> Result<Self, WorkerError> {
        let Some(data) = data else {
            return Ok(Self::default());
        };
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(data)
            .map_err(|e| WorkerError::Payload(format!("push payload is not valid JSON: {e}")))
    }
}

/// Data attached to a notification for the click handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    pub primary_key: Option<JsonValue>,
    pub date_of_arrival: u64,
}

/// A displayed notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: Option<String>,
    pub vibrate: Vec<u32>,
    /// Stays on screen until the user acts on it.
    pub require_interaction: bool,
    pub actions: Vec<NotificationAction>,
    pub data: NotificationData,
}

impl Notification {
    /// Build a notification from a payload, filling gaps from defaults.
    pub fn from_payload(payload: PushPayload, defaults: &NotificationConfig) -> Self {
        let actions = payload.actions.unwrap_or_else(|| {
            vec![
                NotificationAction::new("checkin", "Check in"),
                NotificationAction::new("checkout", "Check out"),
            ]
        });

        Self {
            id: NotificationId::new(),
            title: payload.title.unwrap_or_else(|| defaults.default_title.clone()),
            body: payload.body.unwrap_or_else(|| defaults.default_body.clone()),
            icon: payload.icon.unwrap_or_else(|| defaults.icon.clone()),
            badge: payload.badge.unwrap_or_else(|| defaults.badge.clone()),
            tag: payload.tag,
            vibrate: defaults.vibrate.clone(),
            require_interaction: true,
            actions,
            data: NotificationData {
                primary_key: payload.primary_key,
                date_of_arrival: SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_millis() as u64)
                    .unwrap_or_default(),
            },
        }
    }
}

/// Notifications currently on screen.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    shown: HashMap<NotificationId, Notification>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display a notification. A notification with the same tag replaces
    /// the previous one.
    pub fn show(&mut self, notification: Notification) {
        if let Some(tag) = &notification.tag {
            self.shown.retain(|_, n| n.tag.as_ref() != Some(tag));
        }
        self.shown.insert(notification.id, notification);
    }

    /// Close a notification.
    pub fn close(&mut self, id: NotificationId) -> Option<Notification> {
        self.shown.remove(&id)
    }

    pub fn get(&self, id: NotificationId) -> Option<&Notification> {
        self.shown.get(&id)
    }

    /// Displayed notifications, oldest first.
    pub fn active(&self) -> Vec<&Notification> {
        let mut active: Vec<_> = self.shown.values().collect();
        active.sort_by_key(|n| n.id);
        active
    }

    pub fn len(&self) -> usize {
        self.shown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shown.is_empty()
    }
}

/// What a click asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickAction {
    CheckIn,
    CheckOut,
    View,
    Dismiss,
    /// Body click or an action this worker does not know.
    Default,
}

impl ClickAction {
    pub fn from_action(action: Option<&str>) -> Self {
        match action.map(str::trim) {
            None | Some("") => Self::Default,
            Some("checkin") => Self::CheckIn,
            Some("checkout") => Self::CheckOut,
            Some("view") => Self::View,
            Some("close") | Some("dismiss") => Self::Dismiss,
            Some(other) => {
                debug!(action = other, "Unknown notification action, opening app");
                Self::Default
            }
        }
    }

    /// Value for the `action` query parameter, if any.
    pub fn query(&self) -> Option<&'static str> {
        match self {
            Self::CheckIn => Some("checkin"),
            Self::CheckOut => Some("checkout"),
            _ => None,
        }
    }
}

/// Reacts to push messages and notification interaction.
pub struct NotificationResponder {
    scope: WorkerScope,
    center: Arc<RwLock<NotificationCenter>>,
}

impl NotificationResponder {
    pub(crate) fn new(scope: WorkerScope) -> Self {
        Self {
            scope,
            center: Arc::new(RwLock::new(NotificationCenter::new())),
        }
    }

    /// Shared handle to the displayed notifications.
    pub fn center(&self) -> Arc<RwLock<NotificationCenter>> {
        Arc::clone(&self.center)
    }

    /// Handle a push message. A malformed payload is logged and nothing is
    /// displayed.
    pub async fn on_push(&self, data: Option<&[u8]>) -> Option<Notification> {
        let payload = match PushPayload::parse(data) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Dropping push message");
                return None;
            }
        };

        let notification = Notification::from_payload(payload, &self.scope.config.notification);
        info!(id = notification.id.raw(), title = %notification.title, "Showing notification");

        self.center.write().await.show(notification.clone());
        self.scope.emit(HostEvent::NotificationShown {
            id: notification.id,
            title: notification.title.clone(),
            primary_key: notification.data.primary_key.clone(),
        });
        Some(notification)
    }

    /// Handle a click. Returns the window that was opened or focused.
    pub async fn on_click(
        &self,
        id: NotificationId,
        action: Option<&str>,
    ) -> Result<Option<Client>, WorkerError> {
        if self.center.write().await.close(id).is_none() {
            debug!(id = id.raw(), "Clicked notification was not on screen");
        }
        self.scope.emit(HostEvent::NotificationClosed { id });

        let action = ClickAction::from_action(action);
        if action == ClickAction::Dismiss {
            debug!(id = id.raw(), "Notification dismissed");
            return Ok(None);
        }

        let target = self.scope.config.app_url(action.query())?;
        self.open_or_focus(target).await.map(Some)
    }

    /// Handle a close without any action.
    pub async fn on_close(&self, id: NotificationId) {
        self.center.write().await.close(id);
        info!(id = id.raw(), "Notification closed without action");
        self.scope.emit(HostEvent::NotificationClosed { id });
    }

    /// Focus an app window (navigating it to `target` if needed), or open
    /// one. Exactly one window is touched.
    async fn open_or_focus(&self, target: url::Url) -> Result<Client, WorkerError> {
        let config = &self.scope.config;
        let mut clients = self.scope.clients.write().await;

        let options = ClientMatchOptions {
            include_uncontrolled: true,
            client_type: ClientType::Window,
        };
        let existing = {
            let windows: Vec<&Client> = clients
                .match_all(&options)
                .into_iter()
                .filter(|c| config.in_scope(&c.url))
                .collect();
            windows
                .iter()
                .find(|c| c.url == target)
                .or_else(|| windows.first())
                .map(|c| (c.id.clone(), c.url.clone()))
        };

        match existing {
            Some((client_id, url)) => {
                if url != target {
                    clients.navigate(&client_id, target.clone())?;
                    self.scope.emit(HostEvent::WindowNavigated {
                        client_id: client_id.clone(),
                        url: target,
                    });
                }
                let client = clients.focus(&client_id)?;
                self.scope.emit(HostEvent::WindowFocused { client_id });
                Ok(client)
            }
            None => {
                let client = clients.open_window(target);
                self.scope.emit(HostEvent::WindowOpened {
                    client_id: client.id.clone(),
                    url: client.url.clone(),
                });
                Ok(client)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_payload() {
        assert_eq!(PushPayload::parse(None).unwrap(), PushPayload::default());
        assert_eq!(PushPayload::parse(Some(b"  ")).unwrap(), PushPayload::default());
    }

    #[test]
    fn test_parse_payload_fields() {
        let payload = PushPayload::parse(Some(
            br#"{"title":"Class starts","body":"Room 4","primaryKey":7}"#,
        ))
        .unwrap();
        assert_eq!(payload.title.as_deref(), Some("Class starts"));
        assert_eq!(payload.primary_key, Some(serde_json::json!(7)));
    }

    #[test]
    fn test_parse_rejects_plain_text() {
        assert!(matches!(
            PushPayload::parse(Some(b"hello")),
            Err(WorkerError::Payload(_))
        ));
    }

    #[test]
    fn test_defaults_fill_gaps() {
        let defaults = NotificationConfig::default();
        let n = Notification::from_payload(PushPayload::default(), &defaults);
        assert_eq!(n.title, "Attendance");
        assert_eq!(n.body, defaults.default_body);
        assert!(n.require_interaction);
        let actions: Vec<_> = n.actions.iter().map(|a| a.action.as_str()).collect();
        assert_eq!(actions, vec!["checkin", "checkout"]);
    }

    #[test]
    fn test_tag_replaces_previous() {
        let defaults = NotificationConfig::default();
        let mut center = NotificationCenter::new();
        let tagged = |title: &str| PushPayload {
            title: Some(title.to_string()),
            tag: Some("reminder".to_string()),
            ..Default::default()
        };

        center.show(Notification::from_payload(tagged("first"), &defaults));
        center.show(Notification::from_payload(tagged("second"), &defaults));

        assert_eq!(center.len(), 1);
        assert_eq!(center.active()[0].title, "second");
    }

    #[test]
    fn test_click_action_mapping() {
        assert_eq!(ClickAction::from_action(Some("checkin")), ClickAction::CheckIn);
        assert_eq!(ClickAction::from_action(Some("checkout")).query(), Some("checkout"));
        assert_eq!(ClickAction::from_action(Some("view")).query(), None);
        assert_eq!(ClickAction::from_action(None), ClickAction::Default);
        assert_eq!(ClickAction::from_action(Some("close")), ClickAction::Dismiss);
        assert_eq!(ClickAction::from_action(Some("explore")), ClickAction::Default);
    }
}
