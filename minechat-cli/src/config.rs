//! Settings file and the merge with command-line flags.
//!
//! Settings live at `~/.config/minechat/settings.toml` unless `--config`
//! points elsewhere. `register` writes the new token back into that file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use minechat_sdk::{Endpoint, Timeouts};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "minechat.dvmn.org";
pub const DEFAULT_READ_PORT: u16 = 5000;
pub const DEFAULT_WRITE_PORT: u16 = 5050;
pub const DEFAULT_HISTORY: &str = "minechat.history";

/// Contents of the settings file. Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    pub read_host: Option<String>,
    pub read_port: Option<u16>,
    pub write_host: Option<String>,
    pub write_port: Option<u16>,
    /// Account hash from registration.
    pub token: Option<String>,
    /// History file path.
    pub history: Option<PathBuf>,
    /// Seconds.
    pub connect_timeout: Option<u64>,
    /// Seconds.
    pub read_timeout: Option<u64>,
    /// Seconds.
    pub idle_timeout: Option<u64>,
    /// `tracing` filter, e.g. `debug` or `minechat_sdk=trace`.
    pub loglevel: Option<String>,
}

pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("minechat")
        .join("settings.toml")
}

impl Settings {
    /// A missing file is an empty configuration; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(s) => {
                toml::from_str(&s).with_context(|| format!("bad settings file {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("can't read {}", path.display())),
        }
    }
}

/// Store `token` in the settings file, keeping every other key as it was.
pub fn save_token(path: &Path, token: &str) -> Result<()> {
    let mut table = match std::fs::read_to_string(path) {
        Ok(s) => s
            .parse::<toml::Table>()
            .with_context(|| format!("bad settings file {}", path.display()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => toml::Table::new(),
        Err(e) => return Err(e).with_context(|| format!("can't read {}", path.display())),
    };
    table.insert("token".to_string(), toml::Value::String(token.to_string()));

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).with_context(|| format!("can't create {}", dir.display()))?;
    }
    let text = toml::to_string_pretty(&table)?;
    std::fs::write(path, text).with_context(|| format!("can't save {}", path.display()))
}

/// Effective values: CLI flags and environment > settings file > defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub read: Endpoint,
    pub write: Endpoint,
    pub token: Option<String>,
    pub history: PathBuf,
    pub timeouts: Timeouts,
}

impl Resolved {
    pub fn merge(cli: &super::Cli, settings: &Settings) -> Self {
        let read = Endpoint::new(
            cli.read_host
                .clone()
                .or_else(|| settings.read_host.clone())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            cli.read_port.or(settings.read_port).unwrap_or(DEFAULT_READ_PORT),
        );
        let write = Endpoint::new(
            cli.write_host
                .clone()
                .or_else(|| settings.write_host.clone())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            cli.write_port.or(settings.write_port).unwrap_or(DEFAULT_WRITE_PORT),
        );

        let token = cli
            .token
            .clone()
            .or_else(|| settings.token.clone())
            .filter(|t| !t.is_empty());

        let history = cli
            .history
            .clone()
            .or_else(|| settings.history.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY));

        let defaults = Timeouts::default();
        let secs = |flag: Option<u64>, file: Option<u64>, fallback: Duration| {
            flag.or(file).map(Duration::from_secs).unwrap_or(fallback)
        };
        let timeouts = Timeouts {
            connect: secs(cli.connect_timeout, settings.connect_timeout, defaults.connect),
            read: secs(cli.read_timeout, settings.read_timeout, defaults.read),
            idle: secs(cli.idle_timeout, settings.idle_timeout, defaults.idle),
        };

        Self {
            read,
            write,
            token,
            history,
            timeouts,
        }
    }
}
