use clap::Parser;
use pkg_constants::paths::{DEFAULT_QUOTA_CONFIG, DEFAULT_QUOTA_DATA_DIR};
use pkg_constants::quota::{
    DEFAULT_WORKERS, PROJECT_LOCK_CAPACITY, PROJECT_LOCK_TTL_SECS, RETRY_BASE_MILLIS,
    RETRY_MAX_SECS,
};
use pkg_constants::state::EVENT_LOG_CAPACITY;
use pkg_controllers::{ControllerConfig, QuotaControllerManager};
use pkg_state::client::StateStore;
use pkg_types::config::{QuotaControllerConfigFile, load_config_file};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "k3rs-quota", about = "k3rs project resource quota controller")]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = DEFAULT_QUOTA_CONFIG)]
    config: String,

    /// Directory for SlateDB state storage
    #[arg(long)]
    data_dir: Option<String>,

    /// Keep state in memory only
    #[arg(long)]
    in_memory: bool,

    /// Number of controller workers
    #[arg(long)]
    workers: Option<usize>,

    /// Idle time before a project lock may be evicted
    #[arg(long)]
    lock_ttl_secs: Option<u64>,

    /// Number of project locks kept before evicting
    #[arg(long)]
    lock_capacity: Option<usize>,

    /// First retry delay after a failed sync
    #[arg(long)]
    retry_base_millis: Option<u64>,

    /// Longest retry delay
    #[arg(long)]
    retry_max_secs: Option<u64>,

    /// Change events buffered before the controller falls behind and resyncs
    #[arg(long)]
    event_log_capacity: Option<usize>,

    /// Log as JSON
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config file (returns defaults if file not found)
    let file_cfg: QuotaControllerConfigFile = load_config_file(&cli.config)?;

    // Merge: CLI args > config file > defaults
    init_tracing(cli.log_json || file_cfg.log_json.unwrap_or(false));
    info!("Config file: {}", cli.config);

    let in_memory = cli.in_memory || file_cfg.in_memory.unwrap_or(false);
    let data_dir = cli
        .data_dir
        .or(file_cfg.data_dir)
        .unwrap_or_else(|| DEFAULT_QUOTA_DATA_DIR.to_string());
    let event_log_capacity = cli
        .event_log_capacity
        .or(file_cfg.event_log_capacity)
        .unwrap_or(EVENT_LOG_CAPACITY);
    let config = ControllerConfig {
        workers: cli.workers.or(file_cfg.workers).unwrap_or(DEFAULT_WORKERS),
        lock_ttl: Duration::from_secs(
            cli.lock_ttl_secs
                .or(file_cfg.lock_ttl_secs)
                .unwrap_or(PROJECT_LOCK_TTL_SECS),
        ),
        lock_capacity: cli
            .lock_capacity
            .or(file_cfg.lock_capacity)
            .unwrap_or(PROJECT_LOCK_CAPACITY),
        retry_base: Duration::from_millis(
            cli.retry_base_millis
                .or(file_cfg.retry_base_millis)
                .unwrap_or(RETRY_BASE_MILLIS),
        ),
        retry_max: Duration::from_secs(
            cli.retry_max_secs
                .or(file_cfg.retry_max_secs)
                .unwrap_or(RETRY_MAX_SECS),
        ),
    };

    info!("Starting k3rs-quota");
    if in_memory {
        info!("  Data dir:  (in memory)");
    } else {
        info!("  Data dir:  {}", data_dir);
    }
    info!("  Workers:   {}", config.workers);

    let store = if in_memory {
        StateStore::in_memory(event_log_capacity).await?
    } else {
        StateStore::new(&data_dir, event_log_capacity).await?
    };

    let manager = Arc::new(QuotaControllerManager::new(store.clone(), config));
    let handle = manager.start();

    tokio::signal::ctrl_c().await?;
    info!("Shutting down k3rs-quota");
    handle.abort();
    store.close().await?;

    Ok(())
}
