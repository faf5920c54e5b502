//! Supervises the reader, writer, and watchdog as one reconnecting unit.
//!
//! A session runs the three tasks together; the first failure drops the
//! other two, whose connections close and report `Closed` before the error
//! reaches the retry supervisor. Timeouts and lost connections reconnect
//! both channels with backoff. Anything else (a rejected token, a protocol
//! break, cancellation) ends the client.

use std::convert::Infallible;
use std::time::Duration;

use tracing::Instrument;

use crate::backoff::BackoffConfig;
use crate::connection::{Endpoint, Timeouts};
use crate::error::{ChatError, ErrorKind};
use crate::queue::Queues;
use crate::reader::ReadChannel;
use crate::retry::RetrySupervisor;
use crate::watchdog::Watchdog;
use crate::writer::WriteChannel;

/// Failure kinds that trigger a reconnect.
pub const RECONNECT_ON: &[ErrorKind] = &[ErrorKind::Timeout, ErrorKind::ConnectionLost];

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Broadcast server.
    pub read: Endpoint,
    /// Authenticated server.
    pub write: Endpoint,
    /// Account token.
    pub token: String,
    pub timeouts: Timeouts,
    pub backoff: BackoffConfig,
}

/// A session must outlive one full timeout window to count as healthy.
pub fn min_time_for_reset(timeouts: &Timeouts) -> Duration {
    timeouts.connect.max(timeouts.read).saturating_add(Duration::from_secs(1))
}

/// The silence the watchdog tolerates.
pub fn watchdog_window(timeouts: &Timeouts) -> Duration {
    timeouts.read.saturating_mul(2)
}

/// One connected attempt: reader, writer, and watchdog.
#[derive(Clone)]
pub struct Session {
    reader: ReadChannel,
    writer: WriteChannel,
    watchdog: Watchdog,
}

impl Session {
    pub fn new(reader: ReadChannel, writer: WriteChannel, watchdog: Watchdog) -> Self {
        Self {
            reader,
            writer,
            watchdog,
        }
    }

    /// Run until the first of the three tasks fails. Liveness left over from
    /// an earlier attempt is discarded so the watchdog starts a fresh window.
    pub async fn run(&self) -> Result<Infallible, ChatError> {
        let stale = self.watchdog.drain();
        if stale > 0 {
            tracing::trace!(stale, "Dropped liveness events from the last session");
        }
        let (never, _, _) =
            tokio::try_join!(self.reader.run(), self.writer.run(), self.watchdog.run())?;
        match never {}
    }
}

pub struct ChatClient {
    session: Session,
    supervisor: RetrySupervisor,
    span: tracing::Span,
}

impl ChatClient {
    /// Wire the channels to `queues`. Nothing connects until [`ChatClient::run`].
    pub fn new(config: ClientConfig, queues: &Queues) -> Self {
        let span = tracing::info_span!("client", read = %config.read, write = %config.write);
        let reader = ReadChannel::from_queues(config.read, config.timeouts, queues);
        let writer = WriteChannel::from_queues(config.write, config.token, config.timeouts, queues);
        let watchdog = Watchdog::new(watchdog_window(&config.timeouts), queues.liveness.clone());
        let supervisor = RetrySupervisor::new("client", config.backoff, RECONNECT_ON)
            .reset_after(min_time_for_reset(&config.timeouts));
        Self {
            session: Session::new(reader, writer, watchdog),
            supervisor,
            span,
        }
    }

    /// Keep the session up, reconnecting as needed. Returns only with a
    /// failure that reconnecting cannot fix.
    pub async fn run(mut self) -> Result<Infallible, ChatError> {
        let span = self.span.clone();
        let session = &self.session;
        self.supervisor
            .run_forever(|| session.run())
            .instrument(span)
            .await
    }
}

/// Read-only mode: stream the broadcast into `reader`'s outputs forever,
/// reconnecting on timeouts and lost connections.
pub async fn listen(
    reader: &ReadChannel,
    timeouts: &Timeouts,
    backoff: BackoffConfig,
) -> Result<Infallible, ChatError> {
    let mut supervisor = RetrySupervisor::new("listener", backoff, RECONNECT_ON)
        .reset_after(min_time_for_reset(timeouts));
    supervisor.run_forever(|| reader.run()).await
}
