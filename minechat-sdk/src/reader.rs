//! The receive-only broadcast connection.

use std::convert::Infallible;

use tracing::Instrument;

use crate::connection::{Connection, Endpoint, Timeouts};
use crate::error::ChatError;
use crate::event::{ChannelRole, LivenessEvent, StatusUpdate, TAG_NEW_MESSAGE};
use crate::protocol::trim_terminator;
use crate::queue::{Queue, Queues};

/// Streams chat lines from the broadcast server into its output queues.
///
/// Each received line first produces a liveness event and is then pushed to
/// every output in registration order.
#[derive(Clone)]
pub struct ReadChannel {
    endpoint: Endpoint,
    timeouts: Timeouts,
    status: Queue<StatusUpdate>,
    liveness: Queue<LivenessEvent>,
    outputs: Vec<Queue<String>>,
    span: tracing::Span,
}

impl ReadChannel {
    pub fn new(
        endpoint: Endpoint,
        timeouts: Timeouts,
        status: Queue<StatusUpdate>,
        liveness: Queue<LivenessEvent>,
    ) -> Self {
        let span = tracing::info_span!("reader", server = %endpoint);
        Self {
            endpoint,
            timeouts,
            status,
            liveness,
            outputs: Vec::new(),
            span,
        }
    }

    /// Reader wired to the standard display and persistence queues.
    pub fn from_queues(endpoint: Endpoint, timeouts: Timeouts, queues: &Queues) -> Self {
        Self::new(endpoint, timeouts, queues.status.clone(), queues.liveness.clone())
            .output(queues.display.clone())
            .output(queues.persistence.clone())
    }

    /// Register one more destination for every received line.
    pub fn output(mut self, queue: Queue<String>) -> Self {
        self.outputs.push(queue);
        self
    }

    /// Connect and stream until the connection fails. Remote EOF is reported
    /// as a lost connection so the supervisor reconnects.
    pub async fn run(&self) -> Result<Infallible, ChatError> {
        self.stream().instrument(self.span.clone()).await
    }

    async fn stream(&self) -> Result<Infallible, ChatError> {
        let mut conn =
            Connection::open(&self.endpoint, self.timeouts, ChannelRole::Read, &self.status)
                .await?;
        let result = self.pump(&mut conn).await;
        conn.close().await;
        result
    }

    async fn pump(&self, conn: &mut Connection) -> Result<Infallible, ChatError> {
        loop {
            let bytes = conn.lines().read_bytes().await?;
            self.liveness.push(LivenessEvent::now(TAG_NEW_MESSAGE));

            let line = match String::from_utf8(bytes) {
                Ok(line) => line,
                Err(e) => {
                    // Framing is by byte, so the next read starts on a fresh line.
                    tracing::warn!(
                        "Skipping undecodable line {:?}",
                        String::from_utf8_lossy(e.as_bytes())
                    );
                    continue;
                }
            };
            let message = trim_terminator(&line);
            tracing::debug!("> {message:?}");
            for out in &self.outputs {
                out.push(message.to_string());
            }
        }
    }
}
