//! bc - send stateful events through the batching queue
//!
//! Runs an in-process queue, its reaper and a batching worker backed by a
//! loopback indexer, so the whole correlation path can be exercised locally.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use batcher::cli::{Cli, Command, EventFile, get_log_path};
use batcher::config::Config;
use batcher::events::routing_table;
use batcher::{BatcherClient, LoopbackIndexer};
use muxqueue::{Batcher, MemoryQueue};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Send { file, timeout_ms } => cmd_send(&config, &file, timeout_ms).await,
        Command::Indices => cmd_indices(),
    }
}

async fn cmd_send(config: &Config, file: &Path, timeout_ms: Option<u64>) -> Result<()> {
    debug!(?file, ?timeout_ms, "cmd_send: called");
    let input = EventFile::load(file).context(format!("Failed to load events from {}", file.display()))?;

    let (queue, rx) = MemoryQueue::new(config.queue.clone());
    let queue = Arc::new(queue);
    let reaper = queue.spawn_reaper();

    let indexer = Arc::new(LoopbackIndexer::new());
    let worker = tokio::spawn(Batcher::new(config.batcher.clone()).run(rx, queue.clone(), indexer.clone()));

    let client = BatcherClient::from_config(queue.clone(), &config.client);
    let deadline = timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.client.request_timeout());

    let outcomes = client.send_events(&input.agent, &input.events, deadline).await;

    let mut failed = 0;
    let mut absent = 0;
    for outcome in &outcomes {
        let line = match outcome {
            Ok(Some(response)) => serde_json::to_string(response)?,
            Ok(None) => {
                absent += 1;
                "null".to_string()
            }
            Err(e) => {
                failed += 1;
                serde_json::json!({ "error": e.to_string() }).to_string()
            }
        };
        println!("{}", line);
    }

    // Drain whatever is still in flight, then stop the reaper
    queue.seal();
    let stats = worker.await.context("Batching worker panicked")?;
    queue.close();
    reaper.abort();
    info!(?stats, metrics = ?queue.metrics(), "cmd_send: done");

    let indexed = outcomes.len() - failed - absent;
    if failed == 0 {
        eprintln!("{} {} events indexed, {} without result", "✓".green(), indexed, absent);
        Ok(())
    } else {
        eprintln!("{} {} of {} events failed", "✗".red(), failed, outcomes.len());
        Err(eyre::eyre!("{} of {} events failed", failed, outcomes.len()))
    }
}

fn cmd_indices() -> Result<()> {
    debug!("cmd_indices: called");
    for (source, index) in routing_table() {
        println!("{} {}", format!("{:<24}", source).cyan(), index);
    }
    Ok(())
}
