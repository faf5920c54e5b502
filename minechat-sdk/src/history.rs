//! Append-only chat history file.
//!
//! One record per received message: `[YYYY.MM.DD HH:MM] <message>\n`, local time.

use std::io::SeekFrom;
use std::path::Path;

use chrono::{DateTime, Local};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};

use crate::queue::Queue;

/// Bytes read from the end of the file when preloading the screen.
pub const DEFAULT_TAIL_BYTES: u64 = 10 * 1024;

pub fn format_record(at: DateTime<Local>, message: &str) -> String {
    format!("[{}] {message}\n", at.format("%Y.%m.%d %H:%M"))
}

/// Append every message from `queue` to `path`, flushing after each record.
/// Runs until an I/O error.
pub async fn save_messages(path: &Path, queue: Queue<String>) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    while let Some(message) = queue.pop().await {
        let record = format_record(Local::now(), &message);
        tracing::trace!("history {record:?}");
        file.write_all(record.as_bytes()).await?;
        file.flush().await?;
    }
    Ok(())
}

/// Push the last lines of the history file into `queue`.
///
/// Reads at most `tail_bytes` from the end. When the read starts mid-file the
/// first line is dropped since it is probably cut. A missing file is empty
/// history. Returns the number of lines pushed.
pub async fn load_tail(
    path: &Path,
    tail_bytes: u64,
    queue: &Queue<String>,
) -> std::io::Result<usize> {
    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let size = file.metadata().await?.len();
    let start = size.saturating_sub(tail_bytes);
    file.seek(SeekFrom::Start(start)).await?;

    let mut reader = BufReader::new(file);
    if start > 0 {
        let mut cut = Vec::new();
        reader.read_until(b'\n', &mut cut).await?;
    }

    let mut rest = Vec::new();
    reader.read_to_end(&mut rest).await?;
    let mut pushed = 0;
    for line in String::from_utf8_lossy(&rest).lines() {
        queue.push(line.to_string());
        pushed += 1;
    }
    Ok(pushed)
}
