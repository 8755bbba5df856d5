//! Command line and environment configuration.
//!
//! Every option can be given as a flag or an environment variable (a `.env`
//! file is loaded first).  [`WatchConfig::from_args`] validates the raw
//! values once at startup; the result is immutable and handed by reference
//! to whatever needs it.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono::FixedOffset;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::checkpoint::DEFAULT_NOTIFIED_CAP;
use crate::classify::DEFAULT_FORMS;
use crate::notify::parse_offset;

/// Palatin Technologies, the issuer this watcher was first written for.
pub const DEFAULT_CIK: u64 = 910267;

/// EDGAR asks automated clients to identify themselves with a contact.
pub const DEFAULT_USER_AGENT: &str = "filing-watch/0.1 (ops@example.com)";

/// Watches one issuer's SEC filings and notifies new ones exactly once.
#[derive(Parser, Debug)]
#[command(name = "filing-watch", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub watch: WatchArgs,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Poll forever (default).
    Run,
    /// Run a single tick and exit.
    Once,
    /// Print the stored checkpoint without modifying it.
    Status {
        /// How many of the most recent notified ids to list.
        #[arg(long, default_value_t = 10)]
        recent: usize,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// EDGAR submissions JSON for one CIK.
    Submissions,
    /// Any RSS 2.0 filings feed (requires --feed-url).
    Rss,
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Feed format to poll.
    #[arg(long, env = "FILING_WATCH_SOURCE", value_enum, default_value_t = SourceKind::Submissions)]
    pub source: SourceKind,

    /// Issuer Central Index Key.
    #[arg(long, env = "SEC_CIK", default_value_t = DEFAULT_CIK)]
    pub cik: u64,

    /// Feed URL; overrides the submissions URL derived from the CIK.
    #[arg(long, env = "FEED_URL")]
    pub feed_url: Option<String>,

    /// User-Agent sent to the feed host.
    #[arg(long, env = "SEC_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 60)]
    pub poll_interval_secs: u64,

    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 20)]
    pub fetch_timeout_secs: u64,

    #[arg(long, env = "DISPATCH_TIMEOUT_SECS", default_value_t = 10)]
    pub dispatch_timeout_secs: u64,

    /// Document-type tokens that trigger a notification (comma separated,
    /// case-insensitive substring match on the title).
    #[arg(long, env = "FILING_FORMS", value_delimiter = ',', default_values = DEFAULT_FORMS.iter().copied())]
    pub forms: Vec<String>,

    /// How many notified ids the checkpoint keeps.
    #[arg(long, env = "NOTIFIED_CAP", default_value_t = DEFAULT_NOTIFIED_CAP)]
    pub notified_cap: usize,

    #[arg(long, env = "CHECKPOINT_PATH", default_value = "filing-watch.checkpoint.json")]
    pub checkpoint: PathBuf,

    /// Extra timezone shown in messages, as a fixed offset (`+01:00`).
    #[arg(long, env = "DISPLAY_OFFSET", default_value = "+01:00", allow_hyphen_values = true)]
    pub display_offset: String,

    #[arg(long, env = "DISPLAY_LABEL", default_value = "CET")]
    pub display_label: String,

    /// Telegram bot token; without it messages only go to the log.
    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    pub telegram_token: Option<String>,

    #[arg(long, env = "CHAT_ID")]
    pub chat_id: Option<String>,

    /// Liveness listener address; empty disables it.
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8080")]
    pub health_addr: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("--source rss requires --feed-url")]
    MissingFeedUrl,

    #[error("at least one form token is required")]
    NoForms,

    #[error("invalid display offset {0:?}; expected e.g. +01:00")]
    DisplayOffset(String),

    #[error("invalid health address {0:?}")]
    HealthAddr(String),

    #[error("TELEGRAM_TOKEN and CHAT_ID must be set together")]
    PartialTelegram,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    Submissions { cik: u64, url: Option<String> },
    Rss { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

/// Validated, immutable runtime configuration.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub source: SourceConfig,
    pub user_agent: String,
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
    pub dispatch_timeout: Duration,
    pub forms: Vec<String>,
    pub notified_cap: usize,
    pub checkpoint_path: PathBuf,
    pub display_offset: FixedOffset,
    pub display_label: String,
    pub telegram: Option<TelegramConfig>,
    pub health_addr: Option<SocketAddr>,
}

impl WatchConfig {
    pub fn from_args(args: &WatchArgs) -> Result<Self, ConfigError> {
        let secs = |value: u64, name: &'static str| {
            if value == 0 {
                Err(ConfigError::Zero(name))
            } else {
                Ok(Duration::from_secs(value))
            }
        };
        let poll_interval = secs(args.poll_interval_secs, "poll interval")?;
        let fetch_timeout = secs(args.fetch_timeout_secs, "fetch timeout")?;
        let dispatch_timeout = secs(args.dispatch_timeout_secs, "dispatch timeout")?;
        if args.notified_cap == 0 {
            return Err(ConfigError::Zero("notified cap"));
        }

        let feed_url = args.feed_url.clone().filter(|u| !u.trim().is_empty());
        let source = match args.source {
            SourceKind::Submissions => SourceConfig::Submissions {
                cik: args.cik,
                url: feed_url,
            },
            SourceKind::Rss => SourceConfig::Rss {
                url: feed_url.ok_or(ConfigError::MissingFeedUrl)?,
            },
        };

        let forms: Vec<String> = args
            .forms
            .iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        if forms.is_empty() {
            return Err(ConfigError::NoForms);
        }

        let display_offset = parse_offset(&args.display_offset)
            .ok_or_else(|| ConfigError::DisplayOffset(args.display_offset.clone()))?;

        let health_addr = match args.health_addr.trim() {
            "" => None,
            addr => Some(
                addr.parse()
                    .map_err(|_| ConfigError::HealthAddr(addr.to_string()))?,
            ),
        };

        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        let telegram = match (non_empty(&args.telegram_token), non_empty(&args.chat_id)) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig { bot_token, chat_id }),
            (None, None) => None,
            _ => return Err(ConfigError::PartialTelegram),
        };

        Ok(Self {
            source,
            user_agent: args.user_agent.clone(),
            poll_interval,
            fetch_timeout,
            dispatch_timeout,
            forms,
            notified_cap: args.notified_cap,
            checkpoint_path: args.checkpoint.clone(),
            display_offset,
            display_label: args.display_label.clone(),
            telegram,
            health_addr,
        })
    }
}
