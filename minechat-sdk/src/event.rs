//! Events the client emits for the presentation layer and the watchdog.

use std::fmt;

use chrono::{DateTime, Local};

/// Which of the two connections an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelRole {
    /// Broadcast stream, receive only.
    Read,
    /// Authenticated stream used for sending.
    Write,
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelRole::Read => f.write_str("read"),
            ChannelRole::Write => f.write_str("write"),
        }
    }
}

/// Lifecycle of one connection attempt: `Initiated → Established → Closed`.
/// A failed dial goes straight from `Initiated` to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Initiated,
    Established,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Initiated => f.write_str("connecting"),
            ConnectionState::Established => f.write_str("established"),
            ConnectionState::Closed => f.write_str("closed"),
        }
    }
}

/// Everything the status queue carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Connection {
        role: ChannelRole,
        state: ConnectionState,
    },
    /// Login succeeded and the server told us who we are.
    NicknameReceived(String),
}

pub const TAG_NEW_MESSAGE: &str = "new message";
pub const TAG_PROMPT_BEFORE_AUTH: &str = "prompt before auth";
pub const TAG_AUTHORIZATION_DONE: &str = "authorization done";
pub const TAG_MESSAGE_SENT: &str = "message sent";
pub const TAG_PING_SENT: &str = "ping sent";

/// Proof of forward progress, consumed by the watchdog.
#[derive(Debug, Clone)]
pub struct LivenessEvent {
    pub tag: &'static str,
    pub at: DateTime<Local>,
}

impl LivenessEvent {
    pub fn now(tag: &'static str) -> Self {
        Self {
            tag,
            at: Local::now(),
        }
    }
}
