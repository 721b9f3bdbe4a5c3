//! Topic-scoped publish/subscribe fan-out (C2).
//!
//! Each topic owns an independent [`tokio::sync::broadcast`] channel,
//! created lazily on first publish or subscribe. Delivery is best-effort:
//! a subscriber that lags or disconnects is dropped without affecting any
//! other subscriber, and publishing never blocks on subscriber I/O.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// The kind of payload carried by a [`BusEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BusPayload {
    TaskUpdate { task_id: Uuid, status: String },
    AttemptEvent { attempt_id: Uuid, kind: String, message: String },
    ChatMessage { sender: String, text: String },
}

/// One event delivered on a topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    pub id: Uuid,
    pub topic: String,
    pub payload: BusPayload,
    pub timestamp: DateTime<Utc>,
}

impl BusEvent {
    pub fn new(topic: impl Into<String>, payload: BusPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// Per-project topic name, matching the naming convention the WebSocket
/// surface exposes under `/ws/project/{id}`.
pub fn project_topic(project_id: Uuid) -> String {
    format!("project:{project_id}")
}

/// Per-attempt topic name.
pub fn attempt_topic(attempt_id: Uuid) -> String {
    format!("attempt:{attempt_id}")
}

const CHANNEL_CAPACITY: usize = 256;

struct Topic {
    sender: broadcast::Sender<BusEvent>,
}

/// The process-wide event bus. Cheap to clone; internal state is behind an
/// `Arc`.
#[derive(Clone)]
pub struct EventBus {
    topics: Arc<RwLock<HashMap<String, Topic>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            topics: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Publishes an event to its topic. Never blocks on a subscriber; if
    /// nobody is currently listening the event is simply dropped.
    #[tracing::instrument(skip(self, payload), fields(topic = %topic))]
    pub async fn publish(&self, topic: impl Into<String>, payload: BusPayload) {
        let topic = topic.into();
        let event = BusEvent::new(topic.clone(), payload);

        let sender = {
            let topics = self.topics.read().await;
            topics.get(&topic).map(|t| t.sender.clone())
        };

        let sender = match sender {
            Some(s) => s,
            None => self.get_or_create_sender(topic).await,
        };

        // A send error just means there are currently zero subscribers.
        let _ = sender.send(event);
        self.prune_idle_topics().await;
    }

    /// Subscribes to a topic, creating its channel if this is the first
    /// subscriber. Callers are expected to have already authorized the
    /// principal against the topic's owning project before calling this.
    pub async fn subscribe(&self, topic: impl Into<String>) -> broadcast::Receiver<BusEvent> {
        let topic = topic.into();
        let sender = {
            let topics = self.topics.read().await;
            topics.get(&topic).map(|t| t.sender.clone())
        };
        match sender {
            Some(s) => s.subscribe(),
            None => self.get_or_create_sender(topic).await.subscribe(),
        }
    }

    /// Current subscriber count for a topic (0 if the topic has never been
    /// created or has no subscribers left).
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.read().await.get(topic).map(|t| t.sender.receiver_count()).unwrap_or(0)
    }

    async fn get_or_create_sender(&self, topic: String) -> broadcast::Sender<BusEvent> {
        let mut topics = self.topics.write().await;
        topics
            .entry(topic)
            .or_insert_with(|| Topic {
                sender: broadcast::channel(CHANNEL_CAPACITY).0,
            })
            .sender
            .clone()
    }

    /// Evicts topics with zero receivers. The bus itself only ever holds the
    /// `Sender` half, so once `receiver_count()` drops to zero nobody can
    /// observe the topic disappearing; the next publish or subscribe just
    /// recreates it lazily, same as if it had never existed.
    async fn prune_idle_topics(&self) {
        let mut topics = self.topics.write().await;
        topics.retain(|_, topic| topic.sender.receiver_count() > 0);
    }

    /// Number of topics currently tracked in memory. Exposed mainly so
    /// callers and tests can observe that idle topics are actually reclaimed.
    pub async fn topic_count(&self) -> usize {
        self.topics.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event_in_order() {
        let bus = EventBus::new();
        let project_id = Uuid::new_v4();
        let topic = project_topic(project_id);
        let mut rx = bus.subscribe(&topic).await;

        bus.publish(&topic, BusPayload::TaskUpdate { task_id: Uuid::new_v4(), status: "todo".into() }).await;
        bus.publish(&topic, BusPayload::TaskUpdate { task_id: Uuid::new_v4(), status: "in_progress".into() }).await;

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let (BusPayload::TaskUpdate { status: s1, .. }, BusPayload::TaskUpdate { status: s2, .. }) = (first.payload, second.payload) else {
            panic!("unexpected payload kind");
        };
        assert_eq!(s1, "todo");
        assert_eq!(s2, "in_progress");
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish("project:orphan", BusPayload::ChatMessage { sender: "a".into(), text: "hi".into() }).await;
    }

    #[tokio::test]
    async fn subscribers_are_isolated_per_topic() {
        let bus = EventBus::new();
        let mut rx_a = bus.subscribe("project:a").await;
        let _rx_b = bus.subscribe("project:b").await;

        bus.publish("project:a", BusPayload::ChatMessage { sender: "x".into(), text: "only for a".into() }).await;

        let event = rx_a.recv().await.unwrap();
        assert_eq!(event.topic, "project:a");
        assert_eq!(bus.subscriber_count("project:b").await, 1);
    }

    #[tokio::test]
    async fn idle_topic_is_evicted_once_its_subscriber_drops() {
        let bus = EventBus::new();
        {
            let _rx = bus.subscribe("project:idle").await;
            assert_eq!(bus.topic_count().await, 1);
        }
        // _rx is dropped here; the channel has zero receivers now, but the
        // map entry still exists until the next publish sweeps it out.
        bus.publish("project:idle", BusPayload::ChatMessage { sender: "x".into(), text: "hi".into() }).await;
        assert_eq!(bus.topic_count().await, 0);
    }

    #[tokio::test]
    async fn active_topic_survives_a_sweep_triggered_by_another_topic() {
        let bus = EventBus::new();
        let _rx = bus.subscribe("project:kept").await;
        bus.publish("project:other", BusPayload::ChatMessage { sender: "x".into(), text: "hi".into() }).await;
        assert_eq!(bus.subscriber_count("project:kept").await, 1);
    }
}
