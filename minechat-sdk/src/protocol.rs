//! Wire literals and newline-delimited line I/O.
//!
//! Both connections speak `\n`-terminated text. A chat message sent by the
//! client ends with an empty line, so one message is `"{text}\n\n"`.

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ChatError, TimeoutPhase};
use crate::event::ChannelRole;

pub const GREETING: &str =
    "Hello %username%! Enter your personal hash or leave it empty to create new account.\n";
pub const WELCOME: &str = "Welcome to chat! Post your message below. End it with an empty line.\n";
pub const SEND_CONFIRMATION: &str = "Message send. Write more, end message with an empty line.\n";
pub const NICKNAME_PROMPT: &str = "Enter preferred nickname below:\n";

/// Replace line breaks so a submission can never end a message early.
pub fn sanitize_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

/// Strip the trailing terminator from a received line.
pub fn trim_terminator(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// A buffered reader/writer pair that reads whole lines under a deadline.
pub struct LineStream<R, W> {
    reader: R,
    writer: W,
    role: ChannelRole,
    read_timeout: Duration,
}

impl<R, W> LineStream<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, role: ChannelRole, read_timeout: Duration) -> Self {
        Self {
            reader,
            writer,
            role,
            read_timeout,
        }
    }

    pub fn role(&self) -> ChannelRole {
        self.role
    }

    /// Read one raw line including its terminator. EOF is an error.
    pub async fn read_bytes(&mut self) -> Result<Vec<u8>, ChatError> {
        let mut buf = Vec::new();
        let n = tokio::time::timeout(self.read_timeout, self.reader.read_until(b'\n', &mut buf))
            .await
            .map_err(|_| ChatError::Timeout {
                role: self.role,
                phase: TimeoutPhase::Read,
                after: self.read_timeout,
            })?
            .map_err(ChatError::io(self.role))?;
        if n == 0 {
            return Err(ChatError::ClosedByPeer { role: self.role });
        }
        Ok(buf)
    }

    /// Read one line as text, terminator kept so prefix checks can include it.
    pub async fn read_line(&mut self) -> Result<String, ChatError> {
        let bytes = self.read_bytes().await?;
        let line = String::from_utf8_lossy(&bytes).into_owned();
        tracing::debug!(role = %self.role, "> {line:?}");
        Ok(line)
    }

    /// Read one line and require it to start with `prefix`.
    pub async fn expect(&mut self, prefix: &str, what: &'static str) -> Result<String, ChatError> {
        let line = self.read_line().await?;
        if !line.starts_with(prefix) {
            return Err(ChatError::protocol(what, &line));
        }
        Ok(line)
    }

    /// Write `data` verbatim and flush.
    pub async fn write_raw(&mut self, data: &str) -> Result<(), ChatError> {
        tracing::debug!(role = %self.role, "< {data:?}");
        self.writer
            .write_all(data.as_bytes())
            .await
            .map_err(ChatError::io(self.role))?;
        self.writer.flush().await.map_err(ChatError::io(self.role))
    }

    /// Transmit one chat message and wait for the server to confirm it.
    /// An empty `message` is the keepalive.
    pub async fn send_message(&mut self, message: &str) -> Result<(), ChatError> {
        self.write_raw(&format!("{}\n\n", sanitize_line(message))).await?;
        self.expect(SEND_CONFIRMATION, "send confirmation").await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> std::io::Result<()> {
        self.writer.shutdown().await
    }
}
