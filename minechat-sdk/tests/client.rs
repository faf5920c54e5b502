//! The supervised session: reconnect on transient failures, stop on fatal ones.

mod common;

use std::time::Duration;

use common::{Peer, TOKEN, bind, eventually};
use minechat_sdk::backoff::BackoffConfig;
use minechat_sdk::client::{RECONNECT_ON, Session};
use minechat_sdk::event::{ChannelRole, ConnectionState, StatusUpdate};
use minechat_sdk::protocol::GREETING;
use minechat_sdk::reader::ReadChannel;
use minechat_sdk::retry::RetrySupervisor;
use minechat_sdk::watchdog::Watchdog;
use minechat_sdk::writer::WriteChannel;
use minechat_sdk::{ChatClient, ClientConfig, Endpoint, ErrorKind, Queues, Timeouts};

fn config(read: Endpoint, write: Endpoint) -> ClientConfig {
    ClientConfig {
        read,
        write,
        token: TOKEN.to_string(),
        timeouts: Timeouts {
            connect: Duration::from_secs(2),
            read: Duration::from_secs(2),
            idle: Duration::from_secs(5),
        },
        backoff: BackoffConfig {
            base: 2.0,
            factor: Duration::from_millis(10),
            max_wait: Some(Duration::from_millis(100)),
            jitter: None,
        },
    }
}

#[tokio::test]
async fn lost_write_connection_restarts_both_channels() {
    let (read_listener, read_ep) = bind().await;
    let (write_listener, write_ep) = bind().await;
    let queues = Queues::new();
    let mut config = config(read_ep, write_ep);
    // The writer only notices a hang-up when it next talks, so keep it chatty.
    config.timeouts.idle = Duration::from_millis(300);
    let client = ChatClient::new(config, &queues);
    let task = tokio::spawn(client.run());

    let mut read1 = Peer::accept(&read_listener).await;
    let mut write1 = Peer::accept(&write_listener).await;
    write1.login(TOKEN, "alice").await;
    read1.send(b"before\n").await;
    assert_eq!(eventually(|| queues.display.try_pop()).await, "before");

    // Server hangs up on the writer; the reader is torn down with it.
    drop(write1);
    assert_eq!(read1.recv_to_eof().await, "");

    let mut read2 = Peer::accept(&read_listener).await;
    queues.send.push("after reconnect".into());
    let mut write2 = Peer::accept(&write_listener).await;
    write2.login(TOKEN, "alice").await;
    assert_eq!(write2.confirm_message().await, "after reconnect");
    read2.send(b"after\n").await;
    assert_eq!(eventually(|| queues.display.try_pop()).await, "after");

    let updates: Vec<_> = std::iter::from_fn(|| queues.status.try_pop()).collect();
    let read_closed = updates.iter().any(|u| {
        *u == StatusUpdate::Connection {
            role: ChannelRole::Read,
            state: ConnectionState::Closed,
        }
    });
    assert!(read_closed, "cancelled reader must report Closed: {updates:?}");
    assert!(!task.is_finished());
    task.abort();
}

fn closed(updates: &[StatusUpdate], role: ChannelRole) -> bool {
    updates.contains(&StatusUpdate::Connection {
        role,
        state: ConnectionState::Closed,
    })
}

#[tokio::test]
async fn watchdog_silence_reconnects_both_channels() {
    let (read_listener, read_ep) = bind().await;
    let (write_listener, write_ep) = bind().await;
    let queues = Queues::new();
    let config = config(read_ep, write_ep);
    // Channel deadlines far beyond the watchdog window, so only silence ends the session.
    let timeouts = Timeouts {
        connect: Duration::from_secs(2),
        read: Duration::from_secs(30),
        idle: Duration::from_secs(30),
    };
    let session = Session::new(
        ReadChannel::from_queues(config.read, timeouts, &queues),
        WriteChannel::from_queues(config.write, TOKEN, timeouts, &queues),
        Watchdog::new(Duration::from_millis(500), queues.liveness.clone()),
    );
    let backoff = config.backoff;
    let task = tokio::spawn(async move {
        let mut supervisor = RetrySupervisor::new("test", backoff, RECONNECT_ON);
        supervisor.run_forever(|| session.run()).await
    });

    let mut read1 = Peer::accept(&read_listener).await;
    let mut write1 = Peer::accept(&write_listener).await;
    write1.login(TOKEN, "alice").await;

    // Both servers stay connected and quiet; the client hangs up on both.
    assert_eq!(read1.recv_to_eof().await, "");
    assert_eq!(write1.recv_to_eof().await, "");

    let _read2 = Peer::accept(&read_listener).await;
    let mut write2 = Peer::accept(&write_listener).await;
    write2.login(TOKEN, "alice").await;

    let updates: Vec<_> = std::iter::from_fn(|| queues.status.try_pop()).collect();
    assert!(closed(&updates, ChannelRole::Read), "{updates:?}");
    assert!(closed(&updates, ChannelRole::Write), "{updates:?}");
    assert!(!task.is_finished());
    task.abort();
}

#[tokio::test]
async fn rejected_token_stops_the_client() {
    let (read_listener, read_ep) = bind().await;
    let (write_listener, write_ep) = bind().await;
    let queues = Queues::new();
    let task = tokio::spawn(ChatClient::new(config(read_ep, write_ep), &queues).run());

    let mut read = Peer::accept(&read_listener).await;
    let mut write = Peer::accept(&write_listener).await;
    write.send(GREETING.as_bytes()).await;
    assert_eq!(write.recv_line().await, format!("{TOKEN}\n"));
    write.send(b"null\n").await;

    let err = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("client kept running")
        .unwrap()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WrongToken);
    assert_eq!(read.recv_to_eof().await, "");
}

#[tokio::test]
async fn refused_connection_is_retried() {
    let (read_listener, read_ep) = bind().await;
    // Reserve a port, then free it so the first dials are refused.
    let (write_listener, write_ep) = bind().await;
    let write_addr = write_listener.local_addr().unwrap();
    drop(write_listener);

    let queues = Queues::new();
    let task = tokio::spawn(ChatClient::new(config(read_ep, write_ep), &queues).run());

    let _read1 = Peer::accept(&read_listener).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let write_listener = tokio::net::TcpListener::bind(write_addr).await.unwrap();

    let mut write = Peer::accept(&write_listener).await;
    write.login(TOKEN, "alice").await;
    assert!(!task.is_finished());
    task.abort();
}
