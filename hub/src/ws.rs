//! WebSocket Broadcaster. Holds per-client subscription
//! state behind an `Arc<RwLock<HashMap<...>>>`, the same concurrency idiom
//! used elsewhere in this crate for in-process client registries.
//!
//! State machine for one client: `Connected -> Subscribed(default) ->
//! [Subscribed | Unsubscribed per message] -> Closed`, terminal on network
//! close, eviction, or server shutdown.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::Message;
use serde::Deserialize;
use task_daemon_core::events::{Event, EventKind};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

/// Liveness ping cadence.
pub const PING_INTERVAL: Duration = Duration::from_secs(10);
/// A client silent longer than this is evicted.
pub const EVICTION_TIMEOUT: Duration = Duration::from_secs(30);

pub type ClientId = String;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
enum ClientMessage {
    Subscribe { event_types: Vec<EventKind> },
    Unsubscribe { event_types: Vec<EventKind> },
}

struct ClientState {
    subscriptions: HashSet<EventKind>,
    last_seen: Instant,
    outbox: mpsc::UnboundedSender<Message>,
}

/// Fan-out table of connected WebSocket clients for one environment.
pub struct Broadcaster {
    clients: RwLock<HashMap<ClientId, ClientState>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Broadcaster { clients: RwLock::new(HashMap::new()) }
    }

    /// Registers a new client with the five default subscriptions
    /// and returns its id plus the receiving half of its
    /// outbound message channel, which the caller's socket-forwarding
    /// task drains.
    pub async fn connect(&self) -> (ClientId, mpsc::UnboundedReceiver<Message>) {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        let state = ClientState {
            subscriptions: EventKind::default_subscriptions().into_iter().collect(),
            last_seen: Instant::now(),
            outbox: tx,
        };
        self.clients.write().await.insert(id.clone(), state);
        (id, rx)
    }

    pub async fn disconnect(&self, id: &str) {
        self.clients.write().await.remove(id);
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Refreshes `last_seen` on any inbound traffic (text frame or pong).
    pub async fn touch(&self, id: &str) {
        if let Some(state) = self.clients.write().await.get_mut(id) {
            state.last_seen = Instant::now();
        }
    }

    /// Parses a client's `{type, eventTypes}` frame and mutates its
    /// subscription set. Malformed frames are logged and ignored rather
    /// than closing the connection.
    pub async fn handle_client_message(&self, id: &str, text: &str) {
        let message: ClientMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => {
                warn!(client = id, error = %e, "ignoring malformed websocket frame");
                return;
            }
        };
        let mut clients = self.clients.write().await;
        let Some(state) = clients.get_mut(id) else { return };
        match message {
            ClientMessage::Subscribe { event_types } => {
                state.subscriptions.extend(event_types);
            }
            ClientMessage::Unsubscribe { event_types } => {
                for kind in event_types {
                    state.subscriptions.remove(&kind);
                }
            }
        }
    }

    /// Sends `event` to every client subscribed to its kind. A send
    /// failure (closed channel) marks the client for removal rather than
    /// aborting the whole broadcast.
    ///
    /// Wraps `event` in the downstream `{ id, event }` envelope; `id` tags this one broadcast, not the
    /// recipient, so every subscribed client sees the same id for the
    /// same event.
    pub async fn broadcast(&self, event: &Event) {
        let envelope = serde_json::json!({ "id": Uuid::new_v4().to_string(), "event": event });
        let payload = match serde_json::to_string(&envelope) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "failed to serialize event for broadcast");
                return;
            }
        };
        let mut dead = Vec::new();
        {
            let clients = self.clients.read().await;
            for (id, state) in clients.iter() {
                if !state.subscriptions.contains(&event.kind) {
                    continue;
                }
                if state.outbox.send(Message::Text(payload.clone())).is_err() {
                    dead.push(id.clone());
                }
            }
        }
        if !dead.is_empty() {
            let mut clients = self.clients.write().await;
            for id in dead {
                clients.remove(&id);
            }
        }
    }

    /// Sends a ping frame to every connected client.
    pub async fn ping_all(&self) {
        let clients = self.clients.read().await;
        for state in clients.values() {
            let _ = state.outbox.send(Message::Ping(Vec::new()));
        }
    }

    /// Evicts clients whose `last_seen` is older than [`EVICTION_TIMEOUT`],
    /// returning their ids.
    pub async fn evict_stale(&self) -> Vec<ClientId> {
        let now = Instant::now();
        let mut clients = self.clients.write().await;
        let stale: Vec<ClientId> = clients
            .iter()
            .filter(|(_, s)| now.duration_since(s.last_seen) > EVICTION_TIMEOUT)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            clients.remove(id);
            debug!(client = id, "evicted unresponsive websocket client");
        }
        stale
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns the background ping/eviction sweep. Returns the task handle so callers can abort it on shutdown.
pub fn spawn_liveness_sweep(broadcaster: Arc<Broadcaster>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PING_INTERVAL);
        loop {
            interval.tick().await;
            broadcaster.ping_all().await;
            broadcaster.evict_stale().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn connect_assigns_default_subscriptions() {
        let b = Broadcaster::new();
        let (id, _rx) = b.connect().await;
        assert_eq!(b.client_count().await, 1);

        let event = Event::new(EventKind::TaskCreated, Utc::now(), serde_json::json!({}));
        b.broadcast(&event).await;
        // default subscription includes TaskCreated; id unused beyond sanity.
        assert!(!id.is_empty());
    }

    #[tokio::test]
    async fn unsubscribed_kind_is_not_delivered() {
        let b = Broadcaster::new();
        let (id, mut rx) = b.connect().await;
        b.handle_client_message(&id, r#"{"type":"unsubscribe","eventTypes":["task_created"]}"#)
            .await;

        let event = Event::new(EventKind::TaskCreated, Utc::now(), serde_json::json!({}));
        b.broadcast(&event).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stale_client_is_evicted() {
        let b = Broadcaster::new();
        let (id, _rx) = b.connect().await;
        {
            let mut clients = b.clients.write().await;
            clients.get_mut(&id).unwrap().last_seen = Instant::now() - Duration::from_secs(31);
        }
        let evicted = b.evict_stale().await;
        assert_eq!(evicted, vec![id]);
        assert_eq!(b.client_count().await, 0);
    }

    #[tokio::test]
    async fn malformed_frame_is_ignored_not_fatal() {
        let b = Broadcaster::new();
        let (id, _rx) = b.connect().await;
        b.handle_client_message(&id, "not json").await;
        assert_eq!(b.client_count().await, 1);
    }
}
