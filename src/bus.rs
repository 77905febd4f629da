use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// Event published on a session's channel whenever a message is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEvent {
    pub session_id: String,
    pub message_id: String,
    pub role: String,
    pub content: String,
}

/// Per-session broadcast channels for streaming chat turns to subscribers.
/// Channels are created on first use and dropped once the last subscriber
/// is gone; publishing to a session with no subscribers is a no-op.
#[derive(Default)]
pub struct ChatBus {
    channels: Mutex<HashMap<String, broadcast::Sender<ChatEvent>>>,
}

impl ChatBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, session_id: &str) -> broadcast::Receiver<ChatEvent> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    pub fn publish(&self, event: ChatEvent) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = channels.get(&event.session_id) else {
            return;
        };

        if sender.receiver_count() == 0 {
            channels.remove(&event.session_id);
            return;
        }

        let _ = sender.send(event);
    }

    #[cfg(test)]
    fn channel_count(&self) -> usize {
        self.channels.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(session_id: &str, content: &str) -> ChatEvent {
        ChatEvent {
            session_id: session_id.to_string(),
            message_id: "m1".to_string(),
            role: "assistant".to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn delivers_only_to_the_right_session() {
        let bus = ChatBus::new();
        let mut rx_a = bus.subscribe("session-a");
        let mut rx_b = bus.subscribe("session-b");

        bus.publish(event("session-a", "hello a"));

        let received = rx_a.recv().await.unwrap();
        assert_eq!(received.content, "hello a");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_silent() {
        let bus = ChatBus::new();
        bus.publish(event("nobody-home", "dropped"));
        assert_eq!(bus.channel_count(), 0);
    }

    #[tokio::test]
    async fn channel_is_removed_after_last_subscriber_drops() {
        let bus = ChatBus::new();
        let rx = bus.subscribe("session-a");
        assert_eq!(bus.channel_count(), 1);

        drop(rx);
        bus.publish(event("session-a", "late"));
        assert_eq!(bus.channel_count(), 0);
    }
}
