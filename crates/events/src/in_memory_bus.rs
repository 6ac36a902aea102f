//! In-memory pub/sub for tests/dev.

use std::sync::{Mutex, mpsc};

use serde_json::Value;

use crate::bus::{BusError, PubSub, Subscription, TopicMessage, topic_matches};

/// In-memory topic bus.
///
/// - No IO / no async
/// - Best-effort fan-out to matching subscribers
/// - Dead subscribers are dropped while publishing
#[derive(Debug, Default)]
pub struct InMemoryPubSub {
    subscribers: Mutex<Vec<(String, mpsc::Sender<TopicMessage>)>>,
}

impl InMemoryPubSub {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PubSub for InMemoryPubSub {
    fn publish(&self, topic: &str, payload: Value) -> Result<(), BusError> {
        let mut subs = self
            .subscribers
            .lock()
            .map_err(|_| BusError::Unavailable("subscriber registry poisoned".into()))?;

        let message = TopicMessage {
            topic: topic.to_string(),
            payload,
        };
        subs.retain(|(pattern, tx)| {
            !topic_matches(pattern, topic) || tx.send(message.clone()).is_ok()
        });

        Ok(())
    }

    fn subscribe(&self, pattern: &str) -> Subscription<TopicMessage> {
        let (tx, rx) = mpsc::channel();

        // On a poisoned lock the subscription is still returned; it just never
        // receives messages until the process restarts.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push((pattern.to_string(), tx));
        }

        Subscription::new(rx)
    }
}
