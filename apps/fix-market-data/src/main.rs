//! FIX Market Data Replay Binary
//!
//! Feeds captured FIX application messages through the market data client:
//! extraction, subscription tracking, bounded history, audit storage and
//! display all run exactly as they would on a live session.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p fix-market-data -- messages.fix
//! cat messages.fix | cargo run -p fix-market-data
//! ```
//!
//! One message per line, SOH or `|` delimited. Blank lines and lines
//! starting with `#` are skipped. A JSON summary is written to stdout when
//! the input ends; logs go to stderr.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `PRIME_SVC_ACCOUNT_ID`: `SenderCompID`
//! - `PRIME_TARGET_COMP_ID`: `TargetCompID` (default: COIN)
//! - `FIX_MD_HISTORY_CAPACITY`: History buffer size (default: 10000)
//! - `FIX_MD_DB_PATH`: SQLite audit database (default: marketdata.db, empty disables)
//! - `FIX_MD_METRICS_PORT`: Prometheus metrics port (default: 0 = disabled)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: fix-market-data)
//! - `RUST_LOG`: Log level (default: info)

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use fix_market_data::infrastructure::telemetry;
use fix_market_data::{
    AuditCounts, AuditSink, ClientConfig, DryRunSender, FixMessage, LogDisplay, MarketDataClient,
    MarketDataStore, NormalizedRecord, SqliteAuditStore, init_metrics,
};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Records per instrument included in the summary.
const SUMMARY_RECENT_LIMIT: usize = 5;

/// End-of-run report written to stdout.
#[derive(Debug, Serialize)]
struct ReplaySummary {
    lines_read: u64,
    messages: u64,
    parse_errors: u64,
    history_len: usize,
    history_capacity: usize,
    active_subscriptions: usize,
    recent: BTreeMap<String, Vec<NormalizedRecord>>,
    audit: Option<AuditCounts>,
}

#[derive(Debug, Default)]
struct ReplayStats {
    lines_read: u64,
    messages: u64,
    parse_errors: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting FIX market data replay");

    let config = ClientConfig::from_env()?;
    log_config(&config);

    let _metrics_handle = init_metrics(config.server.metrics_port)?;

    let audit = match &config.store.db_path {
        Some(path) => Some(Arc::new(
            SqliteAuditStore::open(path)
                .with_context(|| format!("failed to open audit store {}", path.display()))?,
        )),
        None => None,
    };

    let store = Arc::new(MarketDataStore::new(config.store.history_capacity));
    let mut client = MarketDataClient::new(
        Arc::clone(&store),
        Arc::new(DryRunSender::new()),
        config.session_identity(),
    )
    .with_view(Arc::new(LogDisplay));
    if let Some(audit) = &audit {
        client = client.with_audit(Arc::clone(audit) as Arc<dyn AuditSink>);
    }

    let shutdown_token = CancellationToken::new();
    tokio::spawn(await_shutdown(shutdown_token.clone()));

    let stats = match std::env::args().nth(1) {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("failed to open {path}"))?;
            tracing::info!(path = %path, "Replaying messages from file");
            replay(BufReader::new(file), &client, &shutdown_token).await?
        }
        None => {
            tracing::info!("Replaying messages from stdin");
            replay(BufReader::new(tokio::io::stdin()), &client, &shutdown_token).await?
        }
    };

    tracing::info!(
        lines = stats.lines_read,
        messages = stats.messages,
        parse_errors = stats.parse_errors,
        "Replay finished"
    );
    client.log_status();

    let summary = summarize(&stats, &store, audit.as_deref());
    println!("{}", serde_json::to_string_pretty(&summary)?);

    tracing::info!("FIX market data replay stopped");
    Ok(())
}

/// Feed every line of `reader` to the client until EOF or shutdown.
async fn replay<R>(
    reader: R,
    client: &MarketDataClient,
    shutdown_token: &CancellationToken,
) -> anyhow::Result<ReplayStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = ReplayStats::default();
    let mut lines = reader.lines();

    loop {
        let line = tokio::select! {
            () = shutdown_token.cancelled() => {
                tracing::info!("Replay interrupted");
                break;
            }
            line = lines.next_line() => line.context("failed to read input")?,
        };
        let Some(line) = line else {
            break;
        };
        stats.lines_read += 1;

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        match FixMessage::parse(trimmed) {
            Ok(message) => {
                stats.messages += 1;
                client.on_message(&message);
            }
            Err(e) => {
                stats.parse_errors += 1;
                tracing::warn!(line = stats.lines_read, error = %e, "Skipping unparseable line");
            }
        }
    }

    Ok(stats)
}

/// Build the end-of-run summary.
fn summarize(
    stats: &ReplayStats,
    store: &MarketDataStore,
    audit: Option<&SqliteAuditStore>,
) -> ReplaySummary {
    let mut recent = BTreeMap::new();
    for record in store.all_records() {
        if !recent.contains_key(&record.instrument) {
            let records = store.recent_for(&record.instrument, SUMMARY_RECENT_LIMIT);
            recent.insert(record.instrument, records);
        }
    }

    let audit = audit.and_then(|audit| match audit.row_counts() {
        Ok(counts) => Some(counts),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read audit row counts");
            None
        }
    });

    ReplaySummary {
        lines_read: stats.lines_read,
        messages: stats.messages,
        parse_errors: stats.parse_errors,
        history_len: store.history_len(),
        history_capacity: store.history_capacity(),
        active_subscriptions: store.subscription_count(),
        recent,
        audit,
    }
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Log the parsed configuration.
fn log_config(config: &ClientConfig) {
    tracing::info!(
        sender_comp_id = %config.session.sender_comp_id,
        target_comp_id = %config.session.target_comp_id,
        history_capacity = config.store.history_capacity,
        db_path = ?config.store.db_path,
        metrics_port = config.server.metrics_port,
        "Configuration loaded"
    );
}

/// Load .env file from any ancestor directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
