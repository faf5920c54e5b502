//! Unbounded FIFO mailboxes shared between tasks.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use crate::event::{LivenessEvent, StatusUpdate};

/// Multi-producer, multi-consumer, unbounded, strict-FIFO queue.
///
/// Every handle keeps a sender alive, so the queue never closes while a
/// handle exists and `pop` only returns `None` if that invariant is broken.
/// Consumers take turns on the receiver; each item is delivered once.
pub struct Queue<T> {
    tx: mpsc::UnboundedSender<T>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<T>>>,
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Queue<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Enqueue without waiting.
    pub fn push(&self, item: T) {
        // We hold a receiver ourselves, so the channel cannot be closed.
        let _ = self.tx.send(item);
    }

    /// Wait for the next item. Cancel-safe: dropping the future loses nothing.
    pub async fn pop(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    /// Take the next item if one is ready and no other consumer is waiting.
    pub fn try_pop(&self) -> Option<T> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }
}

/// The queues created once at process start.
#[derive(Clone, Default)]
pub struct Queues {
    /// Inbound chat lines for the screen.
    pub display: Queue<String>,
    /// Inbound chat lines for the history file.
    pub persistence: Queue<String>,
    /// Text submitted by the user.
    pub send: Queue<String>,
    /// Connection state changes and nickname notifications.
    pub status: Queue<StatusUpdate>,
    /// Progress signals for the watchdog.
    pub liveness: Queue<LivenessEvent>,
}

impl Queues {
    pub fn new() -> Self {
        Self::default()
    }
}
