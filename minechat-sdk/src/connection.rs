//! Opening and closing one TCP connection while reporting its state.

use std::fmt;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::error::{ChatError, TimeoutPhase};
use crate::event::{ChannelRole, ConnectionState, StatusUpdate};
use crate::protocol::LineStream;
use crate::queue::Queue;

/// Server address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The three independent deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Dialing the server.
    pub connect: Duration,
    /// Waiting for any single line from the server.
    pub read: Duration,
    /// Waiting for the user before a keepalive is sent.
    pub idle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            read: Duration::from_secs(30),
            idle: Duration::from_secs(15),
        }
    }
}

pub type TcpLines = LineStream<BufReader<OwnedReadHalf>, OwnedWriteHalf>;

/// Emits `Closed` exactly once, on explicit close or on drop.
struct StatusGuard {
    role: ChannelRole,
    status: Queue<StatusUpdate>,
    closed: bool,
}

impl StatusGuard {
    fn emit(&self, state: ConnectionState) {
        tracing::info!(role = %self.role, "Connection {state}");
        self.status.push(StatusUpdate::Connection {
            role: self.role,
            state,
        });
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.emit(ConnectionState::Closed);
        }
    }
}

impl Drop for StatusGuard {
    fn drop(&mut self) {
        self.close();
    }
}

/// A live connection. Closing is guaranteed: either via [`Connection::close`]
/// or, on error and cancellation paths, when the value is dropped.
pub struct Connection {
    lines: TcpLines,
    guard: StatusGuard,
}

impl Connection {
    /// Dial `endpoint`, reporting `Initiated`, then `Established` or `Closed`.
    pub async fn open(
        endpoint: &Endpoint,
        timeouts: Timeouts,
        role: ChannelRole,
        status: &Queue<StatusUpdate>,
    ) -> Result<Self, ChatError> {
        let guard = StatusGuard {
            role,
            status: status.clone(),
            closed: false,
        };
        guard.emit(ConnectionState::Initiated);

        let dial = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
        let tcp = tokio::time::timeout(timeouts.connect, dial)
            .await
            .map_err(|_| ChatError::Timeout {
                role,
                phase: TimeoutPhase::Connect,
                after: timeouts.connect,
            })?
            .map_err(ChatError::io(role))?;
        if let Err(e) = tcp.set_nodelay(true) {
            tracing::debug!(role = %role, "set_nodelay failed: {e}");
        }

        guard.emit(ConnectionState::Established);
        let (reader, writer) = tcp.into_split();
        Ok(Self {
            lines: LineStream::new(BufReader::new(reader), writer, role, timeouts.read),
            guard,
        })
    }

    pub fn role(&self) -> ChannelRole {
        self.guard.role
    }

    pub fn lines(&mut self) -> &mut TcpLines {
        &mut self.lines
    }

    pub fn is_closed(&self) -> bool {
        self.guard.closed
    }

    /// Shut the socket down and report `Closed`. Idempotent.
    pub async fn close(&mut self) {
        if self.guard.closed {
            return;
        }
        if let Err(e) = self.lines.shutdown().await {
            tracing::debug!(role = %self.guard.role, "shutdown: {e}");
        }
        self.guard.close();
    }
}
