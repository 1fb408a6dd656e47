//! Bet Relay Bot
//!
//! Relays horse-racing tips posted in a Telegram group to a bet store and
//! a placement worker.

use anyhow::Context;
use clap::{Parser, Subcommand};
use bet_relay_bot::{
    config::Config,
    executor::{BetExecutor, DryRunExecutor, ExecutionQueue, ExecutionWorker, HttpWorkerExecutor},
    ingester::{classify, snippet, InboundMessage, MessageParser, TelegramBotSource},
    pipeline::{intake_queue, run_processing_loop, BetRouter, Dispatcher, MessageSink, SessionManager},
    storage::{self, BetStore},
    types::BetStatus,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "bet-relay-bot")]
#[command(about = "Relays Telegram betting tips to storage and a placement worker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor the Telegram group and relay bets
    Run {
        /// Log bets instead of sending them to the worker
        #[arg(long)]
        dry_run: bool,
    },
    /// Parse a single message and print the result
    Parse {
        /// Message text
        text: String,
    },
    /// Feed messages from a file (blank-line separated) through the pipeline
    Replay {
        file: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
    /// List bets still waiting for execution
    Pending,
    /// Show bet counts by status
    Stats,
    /// Show the most recent audit log entries
    Logs {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.app.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Run { dry_run } => run_bot(config, dry_run).await,
        Commands::Parse { text } => parse_text(&config, &text),
        Commands::Replay { file, dry_run } => replay(config, &file, dry_run).await,
        Commands::Pending => show_pending(&config).await,
        Commands::Stats => show_stats(&config).await,
        Commands::Logs { limit } => show_logs(&config, limit).await,
    }
}

fn build_executor(config: &Config, dry_run: bool) -> anyhow::Result<Arc<dyn BetExecutor>> {
    match (&config.executor.worker_url, dry_run) {
        (Some(url), false) => {
            tracing::info!("Sending bets to worker at {}", url);
            Ok(Arc::new(HttpWorkerExecutor::new(url, config.executor.request_timeout())?))
        }
        (None, false) => {
            tracing::warn!("No executor.worker_url configured, running in DRY RUN mode");
            Ok(Arc::new(DryRunExecutor))
        }
        (_, true) => {
            tracing::warn!("Running in DRY RUN mode - no bets will be placed");
            Ok(Arc::new(DryRunExecutor))
        }
    }
}

async fn run_bot(config: Config, dry_run: bool) -> anyhow::Result<()> {
    tracing::info!("Starting bet relay bot");

    let store = storage::open(&config.database).await?;
    let executor = build_executor(&config, dry_run)?;

    let (execution, execution_rx) = ExecutionQueue::channel();
    let worker = ExecutionWorker::new(executor, store.clone(), &config.executor);
    let (worker_stop, worker_shutdown) = oneshot::channel();
    let worker_handle = tokio::spawn(async move { worker.run(execution_rx, worker_shutdown).await });

    let router = Arc::new(BetRouter::new(store.clone(), execution, config.betting.clone()));
    match router.requeue_unfinished().await {
        Ok(0) => {}
        Ok(n) => tracing::info!("Re-queued {} bet(s) from the previous run", n),
        Err(e) => tracing::error!("Failed to load unfinished bets: {}", e),
    }

    let source = Arc::new(TelegramBotSource::new(config.telegram.clone())?);
    let mut session = SessionManager::new(source, &config.parser, config.session.clone());
    session.register_callback(router);
    session.start().await.context("failed to start Telegram session")?;

    tracing::info!("Bot running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    session.stop().await;
    let _ = worker_stop.send(());
    let attempted = worker_handle.await?;
    tracing::info!("Bot stopped ({} bet(s) attempted this run)", attempted);
    Ok(())
}

fn parse_text(config: &Config, text: &str) -> anyhow::Result<()> {
    let parser = MessageParser::new(&config.parser);
    let classification = classify(text);
    println!(
        "Classifier: {} (keywords: {}, label: {}, odds token: {})",
        if classification.is_bet() { "bet" } else { "not a bet" },
        classification.keyword_hits,
        classification.has_label,
        classification.has_odds_token
    );

    match parser.parse_detailed(text) {
        Some(parsed) => {
            println!("Tier: {} ({:?} confidence)", parsed.tier, parsed.confidence);
            println!("{}", serde_json::to_string_pretty(&parsed.bet)?);
        }
        None => println!("No bet found in: {}", snippet(text, 80)),
    }
    Ok(())
}

async fn replay(config: Config, file: &Path, dry_run: bool) -> anyhow::Result<()> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("cannot read {}", file.display()))?;
    let messages: Vec<&str> = contents
        .split("\n\n")
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .collect();

    let store = storage::open(&config.database).await?;
    let (execution, execution_rx) = ExecutionQueue::channel();
    let worker = ExecutionWorker::new(build_executor(&config, dry_run)?, store.clone(), &config.executor);
    let (_worker_stop, worker_shutdown) = oneshot::channel::<()>();
    let worker_handle = tokio::spawn(async move { worker.run(execution_rx, worker_shutdown).await });

    let dispatcher = Dispatcher::new();
    dispatcher.register(Arc::new(BetRouter::new(store.clone(), execution, config.betting.clone())));

    let (intake, intake_rx) = intake_queue();
    let sink = MessageSink::new(intake, Arc::new(MessageParser::new(&config.parser)), config.parser.classify_first);
    let accepted = messages
        .iter()
        .filter(|m| sink.deliver(InboundMessage::text(**m)))
        .count();
    drop(sink);

    let (_stop, shutdown) = oneshot::channel();
    run_processing_loop(intake_rx, dispatcher, shutdown, None).await;
    let attempted = worker_handle.await?;

    println!(
        "Replayed {} message(s): {} bet(s) queued, {} attempted",
        messages.len(),
        accepted,
        attempted
    );
    print_stats(store.as_ref()).await
}

async fn show_pending(config: &Config) -> anyhow::Result<()> {
    let store = storage::open(&config.database).await?;
    let bets = store
        .bets_by_status(&[BetStatus::Pending, BetStatus::Queued, BetStatus::Processing])
        .await?;

    if bets.is_empty() {
        println!("No unfinished bets");
        return Ok(());
    }

    println!("{:<38} {:<11} {:<40} {:>8}", "ID", "Status", "Bet", "Stake");
    println!("{}", "-".repeat(100));
    for bet in bets {
        println!(
            "{:<38} {:<11} {:<40} {:>8}",
            bet.id.as_deref().unwrap_or("-"),
            bet.status.as_str(),
            bet.summary(),
            bet.stake.map(|s| s.to_string()).unwrap_or_else(|| "-".into())
        );
    }
    Ok(())
}

async fn show_stats(config: &Config) -> anyhow::Result<()> {
    let store = storage::open(&config.database).await?;
    print_stats(store.as_ref()).await
}

async fn print_stats(store: &dyn BetStore) -> anyhow::Result<()> {
    let stats = store.statistics().await?;
    println!("\nBets ({}): {}", store.backend(), stats.total);
    for status in BetStatus::ALL {
        println!("  {:<11} {}", status.as_str(), stats.count(status));
    }
    Ok(())
}

async fn show_logs(config: &Config, limit: usize) -> anyhow::Result<()> {
    let store = storage::open(&config.database).await?;
    for entry in store.recent_logs(limit).await? {
        println!(
            "{} {:<12} {}{}",
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.action_type,
            entry.description,
            entry.bet_id.map(|id| format!(" [{}]", id)).unwrap_or_default()
        );
    }
    Ok(())
}
