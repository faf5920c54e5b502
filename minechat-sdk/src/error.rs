//! Error taxonomy for the chat client.
//!
//! Every failure carries an [`ErrorKind`]. Retry boundaries match on the kind,
//! never on the variant, so a new cause only has to pick the right kind to get
//! the right retry behaviour.

use std::fmt;
use std::time::Duration;

use crate::event::ChannelRole;

/// Coarse classification used by retry supervisors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A connect, read, or idle deadline expired.
    Timeout,
    /// The session went silent, the peer hung up, or the socket broke.
    ConnectionLost,
    /// The server sent a line that does not fit the protocol.
    Protocol,
    /// The server rejected the credential.
    WrongToken,
    /// Shutdown was requested.
    Cancelled,
}

/// Which deadline expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    Connect,
    Read,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutPhase::Connect => f.write_str("connect"),
            TimeoutPhase::Read => f.write_str("read"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{phase} timed out after {after:?} on {role} connection")]
    Timeout {
        role: ChannelRole,
        phase: TimeoutPhase,
        after: Duration,
    },
    #[error("no liveness signal for {silence:?}")]
    Silence { silence: Duration },
    #[error("{role} connection closed by peer")]
    ClosedByPeer { role: ChannelRole },
    #[error("{role} connection i/o: {source}")]
    Io {
        role: ChannelRole,
        #[source]
        source: std::io::Error,
    },
    #[error("unexpected {what}: {line:?}")]
    Protocol { what: &'static str, line: String },
    #[error("malformed json in {line:?}: {source}")]
    Json {
        line: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("credential rejected: {0}")]
    WrongToken(String),
    #[error("cancelled: {0}")]
    Cancelled(&'static str),
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::Timeout { .. } => ErrorKind::Timeout,
            ChatError::Silence { .. } | ChatError::ClosedByPeer { .. } | ChatError::Io { .. } => {
                ErrorKind::ConnectionLost
            }
            ChatError::Protocol { .. } | ChatError::Json { .. } => ErrorKind::Protocol,
            ChatError::WrongToken(_) => ErrorKind::WrongToken,
            ChatError::Cancelled(_) => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn io(role: ChannelRole) -> impl FnOnce(std::io::Error) -> ChatError {
        move |source| ChatError::Io { role, source }
    }

    pub(crate) fn protocol(what: &'static str, line: &str) -> ChatError {
        ChatError::Protocol {
            what,
            line: line.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_and_eof_are_connection_lost() {
        let eof = ChatError::ClosedByPeer {
            role: ChannelRole::Read,
        };
        let reset = ChatError::Io {
            role: ChannelRole::Write,
            source: std::io::Error::from(std::io::ErrorKind::ConnectionReset),
        };
        assert_eq!(eof.kind(), ErrorKind::ConnectionLost);
        assert_eq!(reset.kind(), ErrorKind::ConnectionLost);
    }

    #[test]
    fn bad_json_is_a_protocol_break() {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = ChatError::Json {
            line: "{oops".into(),
            source,
        };
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn timeout_message_names_the_phase() {
        let err = ChatError::Timeout {
            role: ChannelRole::Write,
            phase: TimeoutPhase::Connect,
            after: Duration::from_secs(3),
        };
        assert_eq!(err.to_string(), "connect timed out after 3s on write connection");
    }
}
