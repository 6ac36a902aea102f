//! Topic-based publish/subscribe abstraction (mechanics only).
//!
//! The bus distributes messages after the triggering write has already been
//! persisted; it is for distribution, not storage. Delivery is at-most-once:
//! a crash between write and publish is a real, accepted gap, and consumers
//! recover through periodic reconciliation rather than through the bus.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// A message routed by topic.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicMessage {
    pub topic: String,
    pub payload: Value,
}

/// A subscription to a topic pattern.
///
/// Designed for single-threaded consumption: each subscription is drained by
/// one listener thread.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

#[derive(Debug, Clone, Error)]
pub enum BusError {
    #[error("pub/sub transport unavailable: {0}")]
    Unavailable(String),
}

/// Abstract pub/sub transport.
///
/// Subscriptions are ephemeral/non-durable: a subscriber that was not running
/// when a message was published never sees it.
pub trait PubSub: Send + Sync {
    fn publish(&self, topic: &str, payload: Value) -> Result<(), BusError>;

    fn subscribe(&self, pattern: &str) -> Subscription<TopicMessage>;
}

impl<B> PubSub for Arc<B>
where
    B: PubSub + ?Sized,
{
    fn publish(&self, topic: &str, payload: Value) -> Result<(), BusError> {
        (**self).publish(topic, payload)
    }

    fn subscribe(&self, pattern: &str) -> Subscription<TopicMessage> {
        (**self).subscribe(pattern)
    }
}

/// Topic pattern matching: exact, `"*"`, or a `"prefix.*"` category pattern.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    if pattern == "*" || pattern == topic {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix(".*") {
        return topic
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.'));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_wildcard_patterns() {
        assert!(topic_matches("product.changed", "product.changed"));
        assert!(topic_matches("*", "anything"));
        assert!(!topic_matches("product.changed", "category.changed"));
    }

    #[test]
    fn category_patterns_require_the_separator() {
        assert!(topic_matches("price.*", "price.changed"));
        assert!(!topic_matches("price.*", "prices.changed"));
        assert!(!topic_matches("price.*", "price"));
    }
}
