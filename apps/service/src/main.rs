use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use uptick_service::alerts::LogAlerter;
use uptick_service::auth::TokenAuthority;
use uptick_service::config::Config;
use uptick_service::logs::AuditLog;
use uptick_service::monitoring::{OutcomeProcessor, Prober, Worker};
use uptick_service::store::{FileStore, RecordStore};

#[derive(Parser, Debug)]
#[command(name = "uptick-service", about = "Uptime monitoring worker")]
struct Args {
    /// Path to the TOML config file (created with defaults when missing)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init_tracing() {
    let env_filter =
        EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy();

    let log_layer = match std::env::var("RUST_LOG_FORMAT").unwrap_or_default().as_str() {
        "json" => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        _ => tracing_subscriber::fmt::layer().compact().with_filter(env_filter).boxed(),
    };

    tracing_subscriber::registry().with(log_layer).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();
    let config =
        Config::from_config(args.config.as_deref()).context("failed to load configuration")?;

    let store: Arc<dyn RecordStore> = Arc::new(
        FileStore::open(&config.storage.data_dir)
            .await
            .context("failed to open record store")?,
    );
    let audit_log = Arc::new(
        AuditLog::open(&config.storage.logs_dir)
            .await
            .context("failed to open audit log directory")?,
    );
    let token_authority = Arc::new(TokenAuthority::new(
        store.clone(),
        config.auth.hashing_secret.clone(),
        config.auth.token_ttl_ms,
    ));
    let prober = Arc::new(Prober::new().context("failed to build probe client")?);
    let processor =
        Arc::new(OutcomeProcessor::new(store.clone(), audit_log.clone(), Arc::new(LogAlerter)));

    let worker = Arc::new(Worker::new(
        store,
        audit_log,
        token_authority,
        prober,
        processor,
        config.worker.clone(),
    ));
    let handles = worker.spawn();
    info!(
        check_interval = config.worker.check_interval_secs,
        token_sweep_interval = config.worker.token_sweep_interval_secs,
        "background worker started"
    );

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    warn!("shutdown signal received, stopping worker loops");
    for handle in handles {
        handle.abort();
    }
    Ok(())
}
