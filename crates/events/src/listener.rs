//! Listener threads bound to a topic pattern, with explicit shutdown.

use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::bus::{PubSub, TopicMessage};

const IDLE_POLL: Duration = Duration::from_millis(50);

/// Handle to a running listener thread.
#[derive(Debug)]
pub struct ListenerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Request graceful shutdown and wait for the thread to drain.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Subscribe to `pattern` and process messages on a dedicated thread.
///
/// Handler failures are logged and the message dropped; recovery relies on
/// upstream redelivery or periodic reconciliation, not on local retries.
pub fn spawn_listener<B, F>(name: &str, bus: &B, pattern: &str, handler: F) -> ListenerHandle
where
    B: PubSub + ?Sized,
    F: Fn(TopicMessage) -> anyhow::Result<()> + Send + 'static,
{
    let subscription = bus.subscribe(pattern);
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
    let name = name.to_string();

    let join = thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            info!(listener = %name, "listener started");
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }
                match subscription.recv_timeout(IDLE_POLL) {
                    Ok(message) => {
                        let topic = message.topic.clone();
                        if let Err(e) = handler(message) {
                            warn!(
                                listener = %name,
                                topic = %topic,
                                error = %format!("{e:#}"),
                                "handler failed; message dropped"
                            );
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            info!(listener = %name, "listener stopped");
        })
        .expect("failed to spawn listener thread");

    ListenerHandle {
        shutdown: shutdown_tx,
        join: Some(join),
    }
}
