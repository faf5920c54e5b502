//! The authenticated sending connection.

use std::convert::Infallible;

use tracing::Instrument;

use crate::auth::{self, Account};
use crate::connection::{Connection, Endpoint, Timeouts};
use crate::error::ChatError;
use crate::event::{ChannelRole, LivenessEvent, StatusUpdate, TAG_MESSAGE_SENT, TAG_PING_SENT};
use crate::queue::{Queue, Queues};

/// Logs in, then sends queued messages in order, filling idle gaps with
/// empty keepalive messages.
#[derive(Clone)]
pub struct WriteChannel {
    endpoint: Endpoint,
    token: String,
    timeouts: Timeouts,
    send: Queue<String>,
    status: Queue<StatusUpdate>,
    liveness: Queue<LivenessEvent>,
    span: tracing::Span,
}

impl WriteChannel {
    pub fn new(
        endpoint: Endpoint,
        token: impl Into<String>,
        timeouts: Timeouts,
        send: Queue<String>,
        status: Queue<StatusUpdate>,
        liveness: Queue<LivenessEvent>,
    ) -> Self {
        let span = tracing::info_span!("writer", server = %endpoint);
        Self {
            endpoint,
            token: token.into(),
            timeouts,
            send,
            status,
            liveness,
            span,
        }
    }

    pub fn from_queues(
        endpoint: Endpoint,
        token: impl Into<String>,
        timeouts: Timeouts,
        queues: &Queues,
    ) -> Self {
        Self::new(
            endpoint,
            token,
            timeouts,
            queues.send.clone(),
            queues.status.clone(),
            queues.liveness.clone(),
        )
    }

    /// Connect, authorize, and send until the connection fails.
    pub async fn run(&self) -> Result<Infallible, ChatError> {
        self.session().instrument(self.span.clone()).await
    }

    async fn session(&self) -> Result<Infallible, ChatError> {
        let mut conn =
            Connection::open(&self.endpoint, self.timeouts, ChannelRole::Write, &self.status)
                .await?;
        let result = match self.authorize(&mut conn).await {
            Ok(_) => self.send_loop(&mut conn).await,
            Err(e) => Err(e),
        };
        conn.close().await;
        result
    }

    async fn authorize(&self, conn: &mut Connection) -> Result<Account, ChatError> {
        auth::authorize(conn.lines(), &self.token, &self.status, &self.liveness).await
    }

    async fn send_loop(&self, conn: &mut Connection) -> Result<Infallible, ChatError> {
        loop {
            // Only this deadline becomes a keepalive. Timeouts while
            // transmitting or awaiting confirmation propagate as errors.
            match tokio::time::timeout(self.timeouts.idle, self.send.pop()).await {
                Ok(Some(message)) => {
                    tracing::debug!("User wrote {message:?}");
                    conn.lines().send_message(&message).await?;
                    self.liveness.push(LivenessEvent::now(TAG_MESSAGE_SENT));
                }
                Ok(None) => return Err(ChatError::Cancelled("send queue closed")),
                Err(_idle) => {
                    conn.lines().send_message("").await?;
                    self.liveness.push(LivenessEvent::now(TAG_PING_SENT));
                }
            }
        }
    }
}

/// Connect, log in, send one message, and disconnect.
pub async fn send_once(
    endpoint: &Endpoint,
    timeouts: Timeouts,
    token: &str,
    message: &str,
    status: &Queue<StatusUpdate>,
) -> Result<Account, ChatError> {
    let mut conn = Connection::open(endpoint, timeouts, ChannelRole::Write, status).await?;
    let liveness = Queue::new();
    let result = async {
        let account = auth::authorize(conn.lines(), token, status, &liveness).await?;
        conn.lines().send_message(message).await?;
        Ok::<_, ChatError>(account)
    }
    .await;
    conn.close().await;
    result
}

/// Connect, register `nickname`, and return the new account token.
pub async fn register_account(
    endpoint: &Endpoint,
    timeouts: Timeouts,
    nickname: &str,
    status: &Queue<StatusUpdate>,
) -> Result<String, ChatError> {
    let mut conn = Connection::open(endpoint, timeouts, ChannelRole::Write, status).await?;
    let result = auth::register(conn.lines(), nickname).await;
    conn.close().await;
    result
}
