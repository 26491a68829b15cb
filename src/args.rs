use std::path::PathBuf;

use clap::Parser;
use tracing::Level;

/// Longest accepted rate window: one week.
const MAX_RATE_WINDOW_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Parser, Debug)]
#[clap(author, version, about = "EVE mission and income tracker", long_about = None)]
pub struct Args {
    #[arg(long, default_value_t = String::from(""), help = "The log directory e.g. '/var/logs'. If this is not provided, only logs out to stdout.")]
    pub base_log_dir: String,

    #[arg(
        long,
        env = "MISSION_TRACKER_LOG_LEVEL",
        default_value_t = Level::INFO,
        help = "Level for the tracker's own events (error, warn, info, debug, trace)"
    )]
    pub log_level: Level,

    #[arg(
        long,
        env = "MISSION_TRACKER_CONFIG",
        default_value = "config.json",
        help = "Path to config.json holding client_id, callback_url and scopes"
    )]
    pub config: PathBuf,

    #[arg(
        long,
        default_value = "token.json",
        help = "File the SSO credential is persisted to"
    )]
    pub token_file: PathBuf,

    #[arg(
        long,
        default_value = "mission_state.json",
        help = "File the journal watermark and mission count are persisted to"
    )]
    pub state_file: PathBuf,

    #[arg(
        long,
        default_value_t = 30u64,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Interval in seconds between polls of the ESI API"
    )]
    pub poll_interval: u64,

    #[arg(
        long,
        default_value_t = 3600u64,
        value_parser = clap::value_parser!(u64).range(1..=MAX_RATE_WINDOW_SECS),
        help = "Trailing window in seconds kept for ISK/hour and LP/hour"
    )]
    pub rate_window: u64,

    #[arg(
        long,
        default_value_t = 300u64,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds to wait for the browser to complete the SSO login"
    )]
    pub callback_timeout: u64,

    #[arg(
        long,
        default_value_t = false,
        help = "Discard any stored credential and log in again"
    )]
    pub login: bool,

    #[arg(
        long,
        default_value_t = false,
        help = "Only log the login URL instead of opening it in the default browser"
    )]
    pub no_browser: bool,
}

pub fn parse_args() -> Args {
    return Args::parse();
}
