//! In-process Event Bus. A `tokio::sync::broadcast` fan-out
//! of the typed [`Event`] envelope: `publish` returns as soon as the value
//! is queued for every current subscriber, so one subscriber reading
//! slowly (or never) cannot block the publisher or any other subscriber.

use task_daemon_core::events::Event;
use tokio::sync::broadcast;

/// Bounded lag buffer per subscriber; a subscriber that falls this far
/// behind misses the oldest events rather than stalling the bus
/// (`broadcast::Receiver::recv` returns `Lagged` and resumes from there).
const CHANNEL_CAPACITY: usize = 1024;

pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        EventBus { tx }
    }

    /// Queues `event` for delivery to every current subscriber. Returns
    /// immediately; a publish with zero subscribers is a no-op.
    pub fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use task_daemon_core::events::EventKind;

    #[tokio::test]
    async fn publish_reaches_every_subscriber_independently() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(Event::new(EventKind::TasksList, Utc::now(), serde_json::json!({})));

        assert_eq!(a.recv().await.unwrap().kind, EventKind::TasksList);
        assert_eq!(b.recv().await.unwrap().kind, EventKind::TasksList);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish(Event::new(EventKind::TasksList, Utc::now(), serde_json::json!({})));
    }
}
