//! Login and registration handshakes on the write connection.

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::error::ChatError;
use crate::event::{LivenessEvent, StatusUpdate, TAG_AUTHORIZATION_DONE, TAG_PROMPT_BEFORE_AUTH};
use crate::protocol::{GREETING, LineStream, NICKNAME_PROMPT, WELCOME, sanitize_line};
use crate::queue::Queue;

/// Account record the server returns as a single JSON line.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Account {
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub account_hash: Option<String>,
}

fn parse_account(line: &str) -> Result<Account, ChatError> {
    serde_json::from_str(line).map_err(|source| ChatError::Json {
        line: line.to_string(),
        source,
    })
}

/// Log in with `token`.
///
/// Reports the nickname on `status` and progress on `liveness`. A response
/// that is not a JSON object echoing the token means the server does not
/// know the token.
pub async fn authorize<R, W>(
    lines: &mut LineStream<R, W>,
    token: &str,
    status: &Queue<StatusUpdate>,
    liveness: &Queue<LivenessEvent>,
) -> Result<Account, ChatError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    lines.expect(GREETING, "greeting").await?;
    liveness.push(LivenessEvent::now(TAG_PROMPT_BEFORE_AUTH));

    lines.write_raw(&format!("{}\n", sanitize_line(token))).await?;

    let response = lines.read_line().await?;
    if !response.starts_with('{') || !response.contains(token) {
        return Err(ChatError::WrongToken(format!("cannot log in: {response:?}")));
    }
    let account = parse_account(&response)?;
    if let Some(nickname) = &account.nickname {
        tracing::info!(nickname = %nickname, "Authorized");
        status.push(StatusUpdate::NicknameReceived(nickname.clone()));
    }

    lines.expect(WELCOME, "welcome").await?;
    liveness.push(LivenessEvent::now(TAG_AUTHORIZATION_DONE));
    Ok(account)
}

/// Create a new account named `nickname` and return its token.
pub async fn register<R, W>(
    lines: &mut LineStream<R, W>,
    nickname: &str,
) -> Result<String, ChatError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    lines.expect(GREETING, "greeting").await?;
    // An empty token asks for a new account.
    lines.write_raw("\n").await?;

    lines.expect(NICKNAME_PROMPT, "nickname prompt").await?;
    lines.write_raw(&format!("{}\n", sanitize_line(nickname))).await?;

    let response = lines.read_line().await?;
    if !response.starts_with('{') || !response.contains("account_hash") {
        return Err(ChatError::WrongToken(format!("cannot register: {response:?}")));
    }
    match parse_account(&response)?.account_hash {
        Some(hash) if !hash.is_empty() => {
            tracing::info!(nickname, "Registered");
            Ok(hash)
        }
        _ => Err(ChatError::WrongToken(format!(
            "no account hash in {response:?}"
        ))),
    }
}
