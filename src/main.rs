use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
use config::{AppConfig, CliConfig, FileConfig};

mod scoring;

mod sqlite_persistence;

mod server;
use server::{run_metrics_server, run_server, RequestsLoggingLevel, ServerConfig};

mod telemetry;
use telemetry::SqliteTelemetryStore;

mod tracker;
use tracker::SqliteTrackerStore;

mod user;
use user::{auth::load_or_generate_secret, AuthKeys, SqliteUserStore};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the SQLite database files (created if missing).
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3000)]
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

    /// Optional TOML config file; its values override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,
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
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir,
        port: cli_args.port,
        metrics_port: cli_args.metrics_port,
        logging_level: cli_args.logging_level,
        frontend_dir_path: cli_args.frontend_dir_path,
    };
    let app_config = AppConfig::resolve(&cli_config, file_config)?;

    std::fs::create_dir_all(&app_config.db_dir)
        .with_context(|| format!("Failed to create db dir {:?}", app_config.db_dir))?;

    let secret = load_or_generate_secret(&app_config.db_dir.join("jwt.secret"))?;
    let auth_keys = AuthKeys::new(&secret);

    info!("Opening databases in {:?}...", app_config.db_dir);
    let user_store = Arc::new(SqliteUserStore::new(app_config.db_dir.join("user.db"))?);
    let tracker_store = Arc::new(SqliteTrackerStore::new(app_config.db_dir.join("tracker.db"))?);
    let telemetry_store = Arc::new(SqliteTelemetryStore::new(
        app_config.db_dir.join("telemetry.db"),
    )?);

    info!("Initializing metrics...");
    server::metrics::init_metrics();

    let metrics_port = app_config.metrics_port;
    tokio::spawn(async move {
        if let Err(err) = run_metrics_server(metrics_port).await {
            error!("Metrics server failed: {:#}", err);
        }
    });

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level,
        port: app_config.port,
        frontend_dir_path: app_config.frontend_dir_path,
    };

    info!("Ready to serve at port {}!", server_config.port);
    info!("Metrics available at port {}!", metrics_port);
    run_server(
        server_config,
        user_store,
        tracker_store,
        telemetry_store,
        auth_keys,
    )
    .await
}
