//! Detects a session that stopped making progress.

use std::convert::Infallible;
use std::time::Duration;

use tracing::Instrument;

use crate::error::ChatError;
use crate::event::LivenessEvent;
use crate::queue::Queue;

/// Fails with a lost connection when no liveness event arrives within
/// `window`. Sockets that die without a FIN or RST are only noticed here.
#[derive(Clone)]
pub struct Watchdog {
    window: Duration,
    liveness: Queue<LivenessEvent>,
    span: tracing::Span,
}

impl Watchdog {
    pub fn new(window: Duration, liveness: Queue<LivenessEvent>) -> Self {
        Self {
            window,
            liveness,
            span: tracing::info_span!("watchdog"),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Discard events left over from an earlier session. Returns how many.
    pub fn drain(&self) -> usize {
        std::iter::from_fn(|| self.liveness.try_pop()).count()
    }

    pub async fn run(&self) -> Result<Infallible, ChatError> {
        self.watch().instrument(self.span.clone()).await
    }

    async fn watch(&self) -> Result<Infallible, ChatError> {
        loop {
            match tokio::time::timeout(self.window, self.liveness.pop()).await {
                Ok(Some(event)) => {
                    tracing::debug!(
                        at = %event.at.format("%H:%M:%S"),
                        "Connection is alive: {}",
                        event.tag
                    );
                }
                Ok(None) => return Err(ChatError::Cancelled("liveness queue closed")),
                Err(_) => {
                    tracing::warn!("{:?} without liveness signal", self.window);
                    return Err(ChatError::Silence {
                        silence: self.window,
                    });
                }
            }
        }
    }
}
