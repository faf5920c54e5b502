//! Terminal presentation: chat lines on stdout, connection status on stderr,
//! user input from stdin.

use std::io::BufRead;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use minechat_sdk::event::StatusUpdate;
use minechat_sdk::history::{self, DEFAULT_TAIL_BYTES};
use minechat_sdk::reader::ReadChannel;
use minechat_sdk::writer::{register_account, send_once};
use minechat_sdk::{ChatClient, ChatError, ClientConfig, ErrorKind, Queue, Queues, client};
use tokio::io::AsyncWriteExt;

use crate::config::{self, Resolved};

const BAD_TOKEN: &str =
    "Invalid token: the server did not recognise it. Check the token or register a new account.";

/// Exit status for a rejected credential.
const EXIT_BAD_TOKEN: u8 = 2;

fn require_token(resolved: &Resolved) -> Result<&str> {
    resolved
        .token
        .as_deref()
        .context("no token configured; pass --token, set TOKEN, or run `minechat register <nickname>`")
}

/// Turn a fatal client error into what the user sees.
fn report(err: ChatError) -> ExitCode {
    if err.kind() == ErrorKind::WrongToken {
        tracing::debug!("{err}");
        eprintln!("{BAD_TOKEN}");
        ExitCode::from(EXIT_BAD_TOKEN)
    } else {
        eprintln!("minechat: {err}");
        ExitCode::FAILURE
    }
}

fn describe(update: &StatusUpdate) -> String {
    match update {
        StatusUpdate::Connection { role, state } => format!("[{role}] {state}"),
        StatusUpdate::NicknameReceived(nickname) => format!("[nick] {nickname}"),
    }
}

async fn print_lines(queue: Queue<String>) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(line) = queue.pop().await {
        stdout.write_all(format!("{line}\n").as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}

async fn print_status(queue: Queue<StatusUpdate>) {
    while let Some(update) = queue.pop().await {
        eprintln!("{}", describe(&update));
    }
}

/// Forward input lines to the send queue. Blank lines are not messages.
fn forward_input(input: impl BufRead, send: &Queue<String>) -> std::io::Result<()> {
    for line in input.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            send.push(line);
        }
    }
    tracing::debug!("stdin closed");
    Ok(())
}

/// Read stdin on a detached thread; a pending read must not hold up exit.
fn spawn_input(send: Queue<String>) -> Result<()> {
    std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            if let Err(e) = forward_input(std::io::stdin().lock(), &send) {
                tracing::error!("stdin: {e}");
            }
        })
        .context("can't start the input thread")?;
    Ok(())
}

fn spawn_history(path: &Path, queues: &Queues) {
    let path = path.to_path_buf();
    let queue = queues.persistence.clone();
    tokio::spawn(async move {
        if let Err(e) = history::save_messages(&path, queue).await {
            tracing::error!("history file {}: {e}", path.display());
        }
    });
}

fn spawn_printers(queues: &Queues) {
    let display = queues.display.clone();
    tokio::spawn(async move {
        if let Err(e) = print_lines(display).await {
            tracing::error!("stdout: {e}");
        }
    });
    tokio::spawn(print_status(queues.status.clone()));
}

pub async fn chat(resolved: &Resolved) -> Result<ExitCode> {
    let token = require_token(resolved)?.to_string();
    let queues = Queues::new();

    let loaded = history::load_tail(&resolved.history, DEFAULT_TAIL_BYTES, &queues.display)
        .await
        .with_context(|| format!("can't load {}", resolved.history.display()))?;
    tracing::debug!(lines = loaded, "History loaded");

    spawn_printers(&queues);
    spawn_history(&resolved.history, &queues);
    spawn_input(queues.send.clone())?;

    let client = ChatClient::new(
        ClientConfig {
            read: resolved.read.clone(),
            write: resolved.write.clone(),
            token,
            timeouts: resolved.timeouts,
            backoff: Default::default(),
        },
        &queues,
    );

    tokio::select! {
        result = client.run() => {
            let Err(e) = result;
            Ok(report(e))
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::debug!("Interrupted");
            Ok(ExitCode::SUCCESS)
        }
    }
}

pub async fn listen(resolved: &Resolved) -> Result<ExitCode> {
    let queues = Queues::new();
    spawn_printers(&queues);
    spawn_history(&resolved.history, &queues);

    let reader = ReadChannel::from_queues(resolved.read.clone(), resolved.timeouts, &queues);
    // Nothing else feeds the watchdog queue in this mode; keep it from growing.
    let liveness = queues.liveness.clone();
    tokio::spawn(async move { while liveness.pop().await.is_some() {} });

    tokio::select! {
        result = client::listen(&reader, &resolved.timeouts, Default::default()) => {
            let Err(e) = result;
            Ok(report(e))
        }
        _ = tokio::signal::ctrl_c() => Ok(ExitCode::SUCCESS),
    }
}

pub async fn send(resolved: &Resolved, message: &str) -> Result<ExitCode> {
    let token = require_token(resolved)?;
    let status = Queue::new();
    match send_once(&resolved.write, resolved.timeouts, token, message, &status).await {
        Ok(account) => {
            let who = account.nickname.unwrap_or_else(|| "unknown".to_string());
            eprintln!("Sent as {who}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(report(e)),
    }
}

pub async fn register(
    resolved: &Resolved,
    nickname: &str,
    settings_path: &Path,
) -> Result<ExitCode> {
    let status = Queue::new();
    let registered =
        register_account(&resolved.write, resolved.timeouts, nickname, &status).await;
    let token = match registered {
        Ok(token) => token,
        Err(e) => return Ok(report(e)),
    };
    config::save_token(settings_path, &token)?;
    println!("{token}");
    eprintln!("Token saved to {}", settings_path.display());
    Ok(ExitCode::SUCCESS)
}
