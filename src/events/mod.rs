//! Topic-based event broadcasting
//!
//! Thin wrapper over `tokio::sync::broadcast`: one channel per topic, created
//! lazily on first publish or subscribe. Publishing never blocks and never
//! fails; an event with no subscribers is simply dropped, and slow subscribers
//! lag rather than exerting backpressure on publishers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;
use tracing::trace;
use utoipa::ToSchema;

/// One event published on a topic
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EngineEvent {
    /// Event kind, e.g. `created`, `progress`, `completed`, `alert`
    pub event_type: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl EngineEvent {
    pub fn new<S: Into<String>>(event_type: S, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// Fire-and-forget, per-topic broadcaster
pub struct EventBroadcaster {
    channels: RwLock<HashMap<String, broadcast::Sender<EngineEvent>>>,
    buffer_size: usize,
}

impl EventBroadcaster {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            buffer_size,
        }
    }

    /// Publish an event on a topic; drops silently when nobody listens
    pub fn publish(&self, topic: &str, event: EngineEvent) {
        let sender = self.sender_for(topic);
        trace!(topic = %topic, event_type = %event.event_type, "publishing event");
        let _ = sender.send(event);
    }

    /// Publish on a coarse topic and on an id-scoped topic in one call, so
    /// subscribers can follow either the whole stream or a single resource
    pub fn publish_scoped(&self, topic: &str, scope: &str, event: EngineEvent) {
        self.publish(scope, event.clone());
        self.publish(topic, event);
    }

    /// Subscribe to a topic; events published before this call are not replayed
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<EngineEvent> {
        self.sender_for(topic).subscribe()
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<EngineEvent> {
        if let Ok(channels) = self.channels.read()
            && let Some(sender) = channels.get(topic)
        {
            return sender.clone();
        }
        match self.channels.write() {
            Ok(mut channels) => channels
                .entry(topic.to_string())
                .or_insert_with(|| broadcast::channel(self.buffer_size).0)
                .clone(),
            // Lock poisoning only happens if another publisher panicked while
            // holding the map; fall back to a detached channel so publishing
            // stays infallible.
            Err(_) => broadcast::channel(self.buffer_size).0,
        }
    }
}
