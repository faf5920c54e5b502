//! Scripted stand-in for the minechat servers.

#![allow(dead_code)]

use std::time::Duration;

use minechat_sdk::Endpoint;
use minechat_sdk::protocol::{GREETING, SEND_CONFIRMATION, WELCOME};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

pub const TOKEN: &str = "3f8a-test-token";

pub async fn bind() -> (TcpListener, Endpoint) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, Endpoint::new("127.0.0.1", port))
}

/// Server side of one accepted connection.
pub struct Peer {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Peer {
    pub async fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
            .await
            .expect("client never connected")
            .unwrap();
        let (r, w) = stream.into_split();
        Self {
            reader: BufReader::new(r),
            writer: w,
        }
    }

    pub async fn send(&mut self, data: &[u8]) {
        self.writer.write_all(data).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Next line from the client, terminator included. Empty at EOF.
    pub async fn recv_line(&mut self) -> String {
        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(5), self.reader.read_line(&mut line))
            .await
            .expect("client went quiet")
            .unwrap();
        line
    }

    /// Everything the client sends until it disconnects.
    pub async fn recv_to_eof(&mut self) -> String {
        let mut rest = String::new();
        tokio::time::timeout(Duration::from_secs(5), self.reader.read_to_string(&mut rest))
            .await
            .expect("client never disconnected")
            .unwrap();
        rest
    }

    /// Play the server side of a successful login.
    pub async fn login(&mut self, token: &str, nickname: &str) {
        self.send(GREETING.as_bytes()).await;
        assert_eq!(self.recv_line().await, format!("{token}\n"));
        let account = format!("{{\"nickname\": \"{nickname}\", \"account_hash\": \"{token}\"}}\n");
        self.send(account.as_bytes()).await;
        self.send(WELCOME.as_bytes()).await;
    }

    /// Read one client message (`text\n\n`) and confirm it.
    pub async fn confirm_message(&mut self) -> String {
        let text = self.recv_line().await;
        assert_eq!(self.recv_line().await, "\n", "message must end with a blank line");
        self.send(SEND_CONFIRMATION.as_bytes()).await;
        text.trim_end_matches('\n').to_string()
    }
}

pub async fn eventually<T>(mut poll: impl FnMut() -> Option<T>) -> T {
    for _ in 0..500 {
        if let Some(v) = poll() {
            return v;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
