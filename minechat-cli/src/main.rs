//! minechat: terminal client for the minechat chat servers.
//!
//!   minechat [chat]              Read and post messages, reconnecting as needed
//!   minechat listen              Only read the chat and keep the history file
//!   minechat send --message ...  Post one message and exit
//!   minechat register <nick>     Create an account and store its token
//!
//! Connection settings come from flags, environment variables
//! (`READ_HOST`, `WRITE_PORT`, `TOKEN`, ...) and the settings file.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod app;
mod config;

#[derive(Parser, Debug)]
#[command(name = "minechat", about = "Chat client for minechat with auto-reconnect")]
pub struct Cli {
    /// Settings file (default: ~/.config/minechat/settings.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `minechat_sdk=trace`
    #[arg(long, global = true)]
    loglevel: Option<String>,

    /// Host of the broadcast server
    #[arg(long, env = "READ_HOST", global = true)]
    read_host: Option<String>,

    /// Port of the broadcast server
    #[arg(long, env = "READ_PORT", global = true)]
    read_port: Option<u16>,

    /// Host of the posting server
    #[arg(long, env = "WRITE_HOST", global = true)]
    write_host: Option<String>,

    /// Port of the posting server
    #[arg(long, env = "WRITE_PORT", global = true)]
    write_port: Option<u16>,

    /// Account token
    #[arg(long, env = "TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// History file
    #[arg(long, env = "HISTORY_FILE", global = true)]
    history: Option<PathBuf>,

    /// Seconds allowed for dialing a server
    #[arg(long, global = true)]
    connect_timeout: Option<u64>,

    /// Seconds allowed between server lines
    #[arg(long, global = true)]
    read_timeout: Option<u64>,

    /// Seconds of user inactivity before a keepalive
    #[arg(long, global = true)]
    idle_timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Read and post messages (default)
    Chat,
    /// Only read the chat and append it to the history file
    Listen,
    /// Post one message and exit
    Send {
        #[arg(long)]
        message: String,
    },
    /// Register a new account and save its token to the settings file
    Register { nickname: String },
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "minechat=info,minechat_sdk=info".into()),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let settings_path = cli.config.clone().unwrap_or_else(config::default_path);
    let settings = config::Settings::load(&settings_path)?;
    init_logging(cli.loglevel.as_deref().or(settings.loglevel.as_deref()));

    let resolved = config::Resolved::merge(&cli, &settings);
    tracing::debug!(
        read = %resolved.read,
        write = %resolved.write,
        history = %resolved.history.display(),
        settings = %settings_path.display(),
        "Configuration"
    );

    match cli.command.clone().unwrap_or(Command::Chat) {
        Command::Chat => app::chat(&resolved).await,
        Command::Listen => app::listen(&resolved).await,
        Command::Send { message } => app::send(&resolved, &message).await,
        Command::Register { nickname } => app::register(&resolved, &nickname, &settings_path).await,
    }
}
