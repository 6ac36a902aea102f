//! `merx-events`: pub/sub abstraction and change-event types.
//!
//! The transport is an abstract topic-based bus with at-most-once delivery;
//! consumers must be idempotent or tolerate occasional message loss.

pub mod bus;
pub mod change_event;
pub mod in_memory_bus;
pub mod listener;

pub use bus::{BusError, PubSub, Subscription, TopicMessage, topic_matches};
pub use change_event::{ChangeEvent, ChangeType, EventMetadata};
pub use in_memory_bus::InMemoryPubSub;
pub use listener::{ListenerHandle, spawn_listener};
