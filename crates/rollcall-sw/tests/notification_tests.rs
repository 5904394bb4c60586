//! Push display and click routing.

mod common;

use bytes::Bytes;
use common::{drain, small_config, url_of, worker, FakeNetwork};
use rollcall_sw::{
    Client, ClientMatchOptions, ClientType, EventOutcome, HostEvent, NotificationId, OfflineWorker,
    WorkerEvent,
};

async fn push(worker: &OfflineWorker, data: Option<&'static [u8]>) -> Option<NotificationId> {
    match worker
        .dispatch(WorkerEvent::Push {
            data: data.map(Bytes::from_static),
        })
        .await
    {
        EventOutcome::NotificationShown(id) => id,
        other => panic!("unexpected outcome: {other:?}"),
    }
}

async fn click(worker: &OfflineWorker, id: NotificationId, action: Option<&str>) -> Option<Client> {
    match worker
        .dispatch(WorkerEvent::NotificationClick {
            notification: id,
            action: action.map(str::to_string),
        })
        .await
    {
        EventOutcome::Window(window) => window,
        other => panic!("unexpected outcome: {other:?}"),
    }
}

async fn windows(worker: &OfflineWorker) -> Vec<Client> {
    let options = ClientMatchOptions {
        include_uncontrolled: true,
        client_type: ClientType::Window,
    };
    let clients = worker.clients();
    let clients = clients.read().await;
    clients.match_all(&options).into_iter().cloned().collect()
}

#[tokio::test]
async fn test_push_shows_payload() {
    let network = FakeNetwork::new();
    let (worker, mut events) = worker(small_config(), &network);

    let id = push(&worker, Some(&br#"{"title":"T","body":"B","primaryKey":42}"#[..]))
        .await
        .unwrap();

    let center = worker.notifications();
    let center = center.read().await;
    let shown = center.get(id).unwrap();
    assert_eq!(shown.title, "T");
    assert_eq!(shown.body, "B");
    assert!(shown.require_interaction);
    assert_eq!(shown.data.primary_key, Some(serde_json::json!(42)));

    assert!(drain(&mut events).iter().any(|e| matches!(
        e,
        HostEvent::NotificationShown { title, .. } if title == "T"
    )));
}

#[tokio::test]
async fn test_empty_push_uses_defaults() {
    let network = FakeNetwork::new();
    let (worker, _events) = worker(small_config(), &network);

    let id = push(&worker, None).await.unwrap();
    let center = worker.notifications();
    let center = center.read().await;
    let shown = center.get(id).unwrap();
    assert_eq!(shown.title, "Attendance");
    assert_eq!(shown.icon, "/icons/icon-192x192.png");
    assert_eq!(shown.actions.len(), 2);
}

#[tokio::test]
async fn test_malformed_push_shows_nothing() {
    let network = FakeNetwork::new();
    let (worker, mut events) = worker(small_config(), &network);

    assert!(push(&worker, Some(&b"{title: oops"[..])).await.is_none());
    assert!(worker.notifications().read().await.is_empty());
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn test_checkin_click_opens_one_window() {
    let network = FakeNetwork::new();
    let (worker, mut events) = worker(small_config(), &network);

    let id = push(&worker, Some(&br#"{"title":"Class starts"}"#[..])).await.unwrap();
    let window = click(&worker, id, Some("checkin")).await.unwrap();

    assert!(window.url.as_str().contains("action=checkin"));
    assert!(window.focused);
    assert_eq!(windows(&worker).await.len(), 1);
    assert!(worker.notifications().read().await.get(id).is_none());

    let events = drain(&mut events);
    assert!(events.contains(&HostEvent::NotificationClosed { id }));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, HostEvent::WindowOpened { .. }))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_click_reuses_open_window() {
    let network = FakeNetwork::new();
    let (worker, mut events) = worker(small_config(), &network);
    let existing = Client::window(url_of("/history"));
    let existing_id = existing.id.clone();
    worker.clients().write().await.add(existing);

    let id = push(&worker, None).await.unwrap();
    let window = click(&worker, id, Some("checkout")).await.unwrap();

    assert_eq!(window.id, existing_id);
    assert_eq!(window.url.query(), Some("action=checkout"));
    assert_eq!(windows(&worker).await.len(), 1);

    let events = drain(&mut events);
    assert!(events.contains(&HostEvent::WindowFocused {
        client_id: existing_id.clone()
    }));
    assert!(!events
        .iter()
        .any(|e| matches!(e, HostEvent::WindowOpened { .. })));
}

#[tokio::test]
async fn test_body_click_opens_root() {
    let network = FakeNetwork::new();
    let (worker, _events) = worker(small_config(), &network);

    let id = push(&worker, None).await.unwrap();
    let window = click(&worker, id, None).await.unwrap();
    assert_eq!(window.url, url_of("/"));
}

#[tokio::test]
async fn test_dismiss_click_opens_nothing() {
    let network = FakeNetwork::new();
    let (worker, _events) = worker(small_config(), &network);

    let id = push(&worker, None).await.unwrap();
    assert!(click(&worker, id, Some("close")).await.is_none());
    assert!(windows(&worker).await.is_empty());
    assert!(worker.notifications().read().await.is_empty());
}

#[tokio::test]
async fn test_close_without_action() {
    let network = FakeNetwork::new();
    let (worker, _events) = worker(small_config(), &network);

    let id = push(&worker, None).await.unwrap();
    let outcome = worker
        .dispatch(WorkerEvent::NotificationClose { notification: id })
        .await;

    assert!(matches!(outcome, EventOutcome::Handled));
    assert!(worker.notifications().read().await.is_empty());
    assert!(windows(&worker).await.is_empty());
}
