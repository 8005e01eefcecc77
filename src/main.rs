use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use std::{fmt::Debug, path::PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use media_library_server::background_jobs::jobs::CategoryReconciliationJob;
use media_library_server::background_jobs::{create_scheduler, JobContext};
use media_library_server::config;
use media_library_server::library::{LibraryManager, LibraryStore, SqliteLibraryStore};
use media_library_server::server::state::ServerState;
use media_library_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig};
use media_library_server::server_store::{ServerStore, SqliteServerStore};
use media_library_server::user::{SqliteUserStore, UserManager};

const MEMORY_METRICS_INTERVAL: Duration = Duration::from_secs(60);

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory containing database files (library.db, user.db, server.db).
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Seconds between periodic category reconciliation runs. 0 disables
    /// the periodic run; startup and library-write triggers still apply.
    #[clap(long, default_value_t = config::DEFAULT_RECONCILE_INTERVAL_SECS)]
    pub reconcile_interval_secs: u64,
}

impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            reconcile_interval_secs: args.reconcile_interval_secs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // TOML overrides CLI
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_dir: {:?}", app_config.db_dir);
    info!("  port: {}", app_config.port);
    info!(
        "  reconcile interval: {:?}",
        app_config.background_jobs.reconcile_interval
    );

    info!("Initializing metrics...");
    metrics::init_metrics();

    if !app_config.library_db_path().exists() {
        info!(
            "Creating new library database at {:?}",
            app_config.library_db_path()
        );
    }
    let library_store = Arc::new(SqliteLibraryStore::new(app_config.library_db_path())?);

    if !app_config.user_db_path().exists() {
        info!(
            "Creating new user database at {:?}",
            app_config.user_db_path()
        );
    }
    let user_store = Arc::new(SqliteUserStore::new(app_config.user_db_path())?);

    info!(
        "Initializing server store at {:?}",
        app_config.server_db_path()
    );
    let server_store = Arc::new(SqliteServerStore::new(app_config.server_db_path())?);

    let library_manager = Arc::new(LibraryManager::new(library_store.clone()));
    let user_manager = Arc::new(UserManager::new(user_store));

    // Set up background job scheduler
    let shutdown_token = CancellationToken::new();
    let (hook_sender, hook_receiver) = tokio::sync::mpsc::channel(100);

    let job_context = JobContext::new(
        shutdown_token.child_token(),
        library_store as Arc<dyn LibraryStore>,
        server_store.clone() as Arc<dyn ServerStore>,
    );

    let (mut scheduler, scheduler_handle) = create_scheduler(
        server_store as Arc<dyn ServerStore>,
        hook_receiver,
        shutdown_token.clone(),
        job_context,
    );

    scheduler
        .register_job(Arc::new(CategoryReconciliationJob::new(
            app_config.background_jobs.reconcile_interval,
        )))
        .await;

    info!(
        "Job scheduler initialized with {} job(s)",
        scheduler.job_count().await
    );

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MEMORY_METRICS_INTERVAL);
        loop {
            interval.tick().await;
            metrics::update_memory_usage();
        }
    });

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        metrics_port: app_config.metrics_port,
        frontend_dir_path: app_config.frontend_dir_path.clone(),
    };
    let state = ServerState::new(
        server_config,
        library_manager,
        user_manager,
        Some(scheduler_handle),
        Some(hook_sender),
    );

    info!("Ready to serve at port {}!", app_config.port);
    info!("Metrics available at port {}!", app_config.metrics_port);

    tokio::select! {
        result = run_server(state) => {
            info!("HTTP server stopped: {:?}", result);
            shutdown_token.cancel();
            result
        },
        _ = scheduler.run() => {
            info!("Scheduler stopped");
            Ok(())
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            shutdown_token.cancel();
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(())
        }
    }
}
