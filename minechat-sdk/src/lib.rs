//! Resilient client for the minechat line protocol.
//!
//! minechat speaks newline-delimited text over two TCP connections: a
//! broadcast stream that only delivers chat lines, and an authenticated
//! stream used to post messages. This crate keeps both up:
//!
//! - [`reader::ReadChannel`] fans every inbound line out to its queues.
//! - [`writer::WriteChannel`] logs in and sends queued messages, with empty
//!   keepalive messages while the user is idle.
//! - [`watchdog::Watchdog`] fails the session when nothing has happened for
//!   two read timeouts.
//! - [`client::ChatClient`] runs all three as one unit and reconnects with
//!   exponential backoff ([`retry::RetrySupervisor`], [`backoff::Backoff`]).
//!
//! Everything talks through the unbounded FIFO [`queue::Queue`]s bundled in
//! [`queue::Queues`]; a UI reads `display` and `status` and writes `send`.

pub mod auth;
pub mod backoff;
pub mod client;
pub mod connection;
pub mod error;
pub mod event;
pub mod history;
pub mod protocol;
pub mod queue;
pub mod reader;
pub mod retry;
pub mod watchdog;
pub mod writer;

pub use client::{ChatClient, ClientConfig};
pub use connection::{Endpoint, Timeouts};
pub use error::{ChatError, ErrorKind};
pub use queue::{Queue, Queues};
