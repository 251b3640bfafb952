//! CLI definition using clap derive.

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "mailwatch", about = "near real-time inbox sync with engagement telemetry")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the sync loop (push channel + polling fallback + notifications)
    Run(RunOpts),
    /// Read or toggle the durable user preferences
    Prefs(PrefsOpts),
    /// Print current preferences and config paths
    Status,
}

#[derive(clap::Args)]
pub struct RunOpts {
    /// REST API base URL
    #[arg(long, env = "MAILWATCH_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    pub server_url: String,

    /// Push endpoint base URL
    #[arg(long, env = "MAILWATCH_WS_URL", default_value = "ws://127.0.0.1:8080/ws/inbox")]
    pub ws_url: String,

    /// Mailbox identity to synchronize
    #[arg(long, env = "MAILWATCH_EMAIL")]
    pub email: String,

    /// API auth token (bearer header; query-string for the shutdown beacon)
    #[arg(long, env = "MAILWATCH_TOKEN")]
    pub token: Option<String>,

    /// Polling fallback period in seconds
    #[arg(long, default_value = "30")]
    pub poll_interval_secs: u64,

    /// Page size for polling queries
    #[arg(long, default_value = "50")]
    pub limit: u32,

    /// Disable the push channel and rely on polling only
    #[arg(long)]
    pub no_push: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn as_bool(self) -> bool {
        matches!(self, Self::On)
    }
}

#[derive(clap::Args)]
pub struct PrefsOpts {
    /// Enable or disable desktop notifications
    #[arg(long, value_enum)]
    pub notifications: Option<Toggle>,

    /// Enable or disable engagement tracking
    #[arg(long, value_enum)]
    pub tracking: Option<Toggle>,
}
