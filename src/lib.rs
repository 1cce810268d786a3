//! Cloud Kitchen back office.
//!
//! Order lifecycle, menu management and checkout for a single delivery
//! kitchen, stored in a local SQLite database. Committed changes are
//! broadcast on an in-process change feed and forwarded to automation
//! webhooks through a transactional outbox.

use anyhow::Context;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod cart;
pub mod commands;
pub mod config;
pub mod customers;
pub mod db;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod menu;
pub mod models;
pub mod notify;
pub mod orders;
pub mod outbox;
pub mod reorder;
pub mod settings;
pub mod stats;
pub mod status;
pub mod webhook;

use commands::Kitchen;
use config::Config;
use outbox::OutboxWorker;
use webhook::HttpWebhookClient;

/// Console plus daily rolling file logging. The file layer writes JSON
/// when `log_json` is set.
fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cloud_kitchen_lib=debug"));

    diagnostics::prune_old_logs(&config.log_dir);
    std::fs::create_dir_all(&config.log_dir).ok();

    let file_appender =
        tracing_appender::rolling::daily(&config.log_dir, diagnostics::LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let (json_layer, text_layer) = if config.log_json {
        let layer = fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_target(true);
        (Some(layer), None)
    } else {
        let layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true);
        (None, Some(layer))
    };
    let console_layer = fmt::layer().with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(json_layer)
        .with(text_layer)
        .init();

    // Dropping the guard flushes and stops the writer; it must live until exit.
    std::mem::forget(guard);
}

/// Entry point for the binary. With no arguments the back office runs the
/// webhook worker until Ctrl-C; `<command> [json]` runs one command and
/// prints its response.
pub fn run() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_sha = env!("BUILD_GIT_SHA"),
        built_at = env!("BUILD_TIMESTAMP"),
        "Starting Cloud Kitchen"
    );

    let mut args = std::env::args().skip(1);
    let command = args.next();
    let payload = args
        .next()
        .map(|raw| serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw)));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async move {
        match command {
            Some(command) => run_command(config, &command, payload).await,
            None => serve(config).await,
        }
    })
}

async fn run_command(
    config: Config,
    command: &str,
    payload: Option<serde_json::Value>,
) -> anyhow::Result<()> {
    let db = Arc::new(db::init(&config.data_dir).context("failed to open database")?);
    let kitchen = Kitchen::new(db, &config);
    let transport = HttpWebhookClient::new(config.webhook_timeout)?;
    let response = commands::dispatch(&kitchen, &transport, command, payload).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let db = Arc::new(db::init(&config.data_dir).context("failed to open database")?);
    let kitchen = Kitchen::new(db.clone(), &config);
    let transport = HttpWebhookClient::new(config.webhook_timeout)?;
    let shutdown = CancellationToken::new();

    let worker = OutboxWorker::new(db, transport, config.outbox_batch, config.outbox_interval);
    let worker_handle = tokio::spawn(worker.run(shutdown.clone()));

    // Trace committed changes so operators can follow activity in the log.
    let mut changes = kitchen.feed.subscribe();
    let feed_shutdown = shutdown.clone();
    let feed_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = feed_shutdown.cancelled() => break,
                received = changes.recv() => match received {
                    Ok(event) => debug!(kind = ?event.kind, order_event = event.is_order_event(), "Change committed"),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Change log lagged behind feed");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    });

    info!(
        data_dir = %config.data_dir.display(),
        policy = ?config.transition_policy,
        "Back office ready; press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    info!("Shutting down");
    shutdown.cancel();
    worker_handle.await.context("outbox worker panicked")?;
    feed_handle.await.context("change log task panicked")?;
    Ok(())
}
