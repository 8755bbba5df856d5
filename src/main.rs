//! filing-watch: exactly-once notifications for one issuer's SEC filings.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌───────────┐ Vec<FeedEntry> ┌──────────┐  Delta   ┌─────────────┐
//! │ source/   │ ─────────────► │ delta.rs │ ───────► │ classify.rs │
//! │ (fetch)   │                │ (pure)   │          │ (allow-list)│
//! └───────────┘                └──────────┘          └─────────────┘
//!       ▲                                                   │
//!       │ tick()          ┌──────────────┐   commit()       ▼
//! ┌───────────┐ ────────► │ checkpoint/  │ ◄──────── ┌─────────────┐
//! │  poll.rs  │           │ (durable)    │           │  notify/    │
//! └───────────┘           └──────────────┘           │ (dispatch)  │
//!                                                     └─────────────┘
//! ┌───────────┐
//! │ health.rs │  independent liveness task, shares nothing
//! └───────────┘
//! ```
//!
//! * **`source/`**: the `DataSource` trait plus EDGAR submissions and RSS
//!   implementations.
//! * **`delta`**: works out which fetched entries are new since the
//!   checkpoint.
//! * **`classify`**: decides which new entries deserve a notification.
//! * **`notify/`**: formats messages and delivers them (Telegram or log).
//! * **`checkpoint/`**: durable `last_seen_id` + bounded notified-id set.
//! * **`poll`**: the sequential tick loop tying the above together.
//! * **`health`**: `GET /health` liveness listener.
//! * **`main`**: parses config, builds the collaborators, and supervises
//!   the poll loop and health listener until ctrl-c / SIGTERM.

mod checkpoint;
mod classify;
mod config;
mod delta;
mod health;
mod notify;
mod poll;
mod source;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use checkpoint::{CheckpointStore, FileCheckpointStore};
use classify::AllowList;
use config::{Cli, Command, SourceConfig, WatchConfig};
use notify::{Dispatcher, LogNotifier, Notifier, TelegramNotifier};
use poll::{Poller, TickOutcome};
use source::{DataSource, EdgarSource, RssSource};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = WatchConfig::from_args(&cli.watch).context("invalid configuration")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&config).await,
        Command::Once => once(&config).await,
        Command::Status { recent } => status(&config, recent),
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

fn build_source(config: &WatchConfig) -> Result<Box<dyn DataSource>> {
    let source: Box<dyn DataSource> = match &config.source {
        SourceConfig::Submissions { cik, url: None } => Box::new(EdgarSource::new(
            *cik,
            &config.user_agent,
            config.fetch_timeout,
        )?),
        SourceConfig::Submissions { cik, url: Some(url) } => Box::new(EdgarSource::with_url(
            *cik,
            url.as_str(),
            &config.user_agent,
            config.fetch_timeout,
        )?),
        SourceConfig::Rss { url } => Box::new(RssSource::new(
            url.as_str(),
            "rss",
            &config.user_agent,
            config.fetch_timeout,
        )?),
    };
    Ok(source)
}

fn build_notifier(config: &WatchConfig) -> Result<Box<dyn Notifier>> {
    match &config.telegram {
        Some(tg) => Ok(Box::new(TelegramNotifier::new(
            tg.bot_token.clone(),
            tg.chat_id.clone(),
            config.dispatch_timeout,
        )?)),
        None => {
            warn!("TELEGRAM_TOKEN / CHAT_ID not set; notifications go to the log only");
            Ok(Box::new(LogNotifier))
        }
    }
}

fn build_poller(config: &WatchConfig) -> Result<Poller> {
    let source = build_source(config).context("failed to build feed client")?;
    let notifier = build_notifier(config).context("failed to build notifier")?;
    let dispatcher = Dispatcher::new(
        notifier,
        config.display_offset,
        config.display_label.as_str(),
        config.dispatch_timeout,
    );
    let store = FileCheckpointStore::new(&config.checkpoint_path, config.notified_cap);
    let classifier = AllowList::new(&config.forms);
    info!(forms = ?classifier.tokens(), "notifying on matching titles");

    Poller::new(
        source,
        Box::new(classifier),
        dispatcher,
        Box::new(store),
        config.fetch_timeout,
    )
    .with_context(|| {
        format!(
            "cannot load checkpoint {}; fix or remove it to start over",
            config.checkpoint_path.display()
        )
    })
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn run(config: &WatchConfig) -> Result<()> {
    let poller = build_poller(config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let health = config
        .health_addr
        .map(|addr| health::spawn_health_server(addr, wait_for_shutdown(shutdown_rx.clone())));
    let poll = tokio::spawn(poller.run(config.poll_interval, wait_for_shutdown(shutdown_rx)));

    shutdown_signal().await;
    info!("shutdown requested");
    let _ = shutdown_tx.send(true);

    poll.await.context("poll loop panicked")?;
    if let Some(health) = health {
        health.await.context("health listener panicked")?;
    }
    Ok(())
}

async fn once(config: &WatchConfig) -> Result<()> {
    let mut poller = build_poller(config)?;
    match poller.tick().await.context("checkpoint commit failed")? {
        TickOutcome::FetchFailed => anyhow::bail!("feed fetch failed"),
        TickOutcome::Bootstrapped { recorded } => info!(recorded, "bootstrap tick done"),
        TickOutcome::Processed(stats) => info!(?stats, "tick done"),
    }
    info!(last_seen_id = ?poller.checkpoint().last_seen_id(), "checkpoint saved");
    Ok(())
}

fn status(config: &WatchConfig, recent: usize) -> Result<()> {
    let store = FileCheckpointStore::new(&config.checkpoint_path, config.notified_cap);
    let checkpoint = store
        .load()
        .with_context(|| format!("cannot read {}", config.checkpoint_path.display()))?;

    println!("checkpoint:    {}", store.path().display());
    match checkpoint.last_seen_id() {
        Some(id) => println!("last_seen_id:  {id}"),
        None => println!("last_seen_id:  (uninitialized)"),
    }
    println!(
        "notified_ids:  {} (cap {})",
        checkpoint.notified_len(),
        store.notified_cap()
    );
    for id in checkpoint.notified_ids().rev().take(recent) {
        println!("  {id}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

/// Resolves once `true` is published on `rx` (or the sender is gone).
async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            break;
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to register SIGTERM handler");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}
