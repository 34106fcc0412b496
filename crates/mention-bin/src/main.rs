//! `mention-replay`: run a JSON event script through the mention engine and
//! print the resulting submission.

use anyhow::Result;
use clap::Parser;
use core_events::{
    ATOMIC_DELETIONS, SEARCH_CACHE_HITS, SEARCH_FAILURES, SEARCHES_DEDUPED, SEARCHES_ISSUED,
    SPANS_DROPPED, STALE_RESPONSES,
};
use core_input::StaticDirectory;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

mod replay;

const LOG_FILE_NAME: &str = "mention-replay.log";

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(
    name = "mention-replay",
    version,
    about = "Replay input scripts through the mention engine"
)]
struct Args {
    /// JSON array of script steps.
    pub script: PathBuf,
    /// JSON array of `{user_id, first_name, last_name}` searched by prefix.
    #[arg(long = "users")]
    pub users: PathBuf,
    /// Optional configuration file path (overrides discovery of `mentions.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Simulated directory latency in milliseconds.
    #[arg(long = "latency-ms", default_value_t = 0)]
    pub latency_ms: u64,
    #[arg(long)]
    pub pretty: bool,
}

fn configure_logging() -> Option<WorkerGuard> {
    let log_dir = Path::new(".");
    let log_path = log_dir.join(LOG_FILE_NAME);
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .try_init()
        .ok()
        .map(|_| guard)
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn log_counters() {
    info!(
        target: "runtime",
        searches_issued = SEARCHES_ISSUED.load(Ordering::Relaxed),
        searches_deduped = SEARCHES_DEDUPED.load(Ordering::Relaxed),
        cache_hits = SEARCH_CACHE_HITS.load(Ordering::Relaxed),
        search_failures = SEARCH_FAILURES.load(Ordering::Relaxed),
        stale_responses = STALE_RESPONSES.load(Ordering::Relaxed),
        atomic_deletions = ATOMIC_DELETIONS.load(Ordering::Relaxed),
        spans_dropped = SPANS_DROPPED.load(Ordering::Relaxed),
        "telemetry"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = configure_logging();
    install_panic_hook();
    info!(target: "runtime", "startup");

    let args = Args::parse();
    let config = core_config::load_from(args.config.clone())?;
    let settings = config.effective();
    let users = replay::load_users(&args.users)?;
    let script = replay::load_script(&args.script)?;
    info!(
        target: "runtime.startup",
        users = users.len(),
        steps = script.len(),
        config_override = args.config.is_some(),
        debounce_ms = settings.debounce.as_millis() as u64,
        "bootstrap_complete"
    );

    let directory = Arc::new(
        StaticDirectory::new(users).with_latency(Duration::from_millis(args.latency_ms)),
    );
    let submission = replay::replay(directory, settings, script).await;
    log_counters();

    let out = if args.pretty {
        serde_json::to_string_pretty(&submission)?
    } else {
        serde_json::to_string(&submission)?
    };
    println!("{out}");
    Ok(())
}
