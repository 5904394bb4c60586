//! Clients API: the pages (windows) a worker can see and steer.

use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use url::Url;

use crate::WorkerError;

/// A client (controlled page).
#[derive(Debug, Clone, PartialEq)]
pub struct Client {
    /// Client ID.
    pub id: String,

    /// Client URL.
    pub url: Url,

    /// Client type.
    pub client_type: ClientType,

    /// Visibility state.
    pub visibility_state: VisibilityState,

    /// Whether focused.
    pub focused: bool,

    /// Whether fetches from this client go through the worker.
    pub controlled: bool,
}

/// Client type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientType {
    #[default]
    Window,
    Worker,
    SharedWorker,
    All,
}

/// Visibility state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityState {
    Hidden,
    Visible,
}

impl Client {
    /// A visible, unfocused, uncontrolled window at `url`.
    pub fn window(url: Url) -> Self {
        Self {
            id: next_client_id(),
            url,
            client_type: ClientType::Window,
            visibility_state: VisibilityState::Visible,
            focused: false,
            controlled: false,
        }
    }
}

/// Options for `match_all`.
#[derive(Debug, Clone, Default)]
pub struct ClientMatchOptions {
    pub include_uncontrolled: bool,
    pub client_type: ClientType,
}

/// Clients API.
#[derive(Debug, Default)]
pub struct Clients {
    clients: HashMap<String, Client>,
}

impl Clients {
    /// Create new clients manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a client by ID.
    pub fn get(&self, id: &str) -> Option<&Client> {
        self.clients.get(id)
    }

    /// Match all clients, ordered by ID.
    pub fn match_all(&self, options: &ClientMatchOptions) -> Vec<&Client> {
        let mut matched: Vec<_> = self
            .clients
            .values()
            .filter(|c| options.include_uncontrolled || c.controlled)
            .filter(|c| match options.client_type {
                ClientType::All => true,
                t => c.client_type == t,
            })
            .collect();
        matched.sort_by(|a, b| a.id.cmp(&b.id));
        matched
    }

    /// Open a window. Windows opened by the worker start focused and
    /// controlled.
    pub fn open_window(&mut self, url: Url) -> Client {
        for other in self.clients.values_mut() {
            other.focused = false;
        }

        let mut client = Client::window(url);
        client.focused = true;
        client.controlled = true;

        self.clients.insert(client.id.clone(), client.clone());
        client
    }

    /// Focus a window client.
    pub fn focus(&mut self, id: &str) -> Result<Client, WorkerError> {
        match self.clients.get(id) {
            None => return Err(WorkerError::NotFound(format!("client {id}"))),
            Some(c) if c.client_type != ClientType::Window => {
                return Err(WorkerError::Client(
                    "Can only focus window clients".to_string(),
                ));
            }
            Some(_) => {}
        }

        for (client_id, client) in self.clients.iter_mut() {
            client.focused = client_id == id;
            if client.focused {
                client.visibility_state = VisibilityState::Visible;
            }
        }
        self.clients
            .get(id)
            .cloned()
            .ok_or_else(|| WorkerError::NotFound(format!("client {id}")))
    }

    /// Navigate a window client to URL.
    pub fn navigate(&mut self, id: &str, url: Url) -> Result<Client, WorkerError> {
        let client = self
            .clients
            .get_mut(id)
            .ok_or_else(|| WorkerError::NotFound(format!("client {id}")))?;
        if client.client_type != ClientType::Window {
            return Err(WorkerError::Client(
                "Can only navigate window clients".to_string(),
            ));
        }
        client.url = url;
        Ok(client.clone())
    }

    /// Take control of every uncontrolled client accepted by `in_scope`.
    /// Returns how many clients changed hands.
    pub fn claim(&mut self, in_scope: impl Fn(&Url) -> bool) -> usize {
        let mut claimed = 0;
        for client in self.clients.values_mut() {
            if !client.controlled && in_scope(&client.url) {
                client.controlled = true;
                claimed += 1;
            }
        }
        claimed
    }

    /// Add a client.
    pub fn add(&mut self, client: Client) {
        self.clients.insert(client.id.clone(), client);
    }

    /// Remove a client.
    pub fn remove(&mut self, id: &str) -> Option<Client> {
        self.clients.remove(id)
    }

    /// Number of clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether there are no clients.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

fn next_client_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!("client-{:08}", COUNTER.fetch_add(1, Ordering::Relaxed))
}
