//! Permission registry API server
//!
//! # Usage
//!
//! ```bash
//! # In-memory registry on 0.0.0.0:8080
//! permreg-server
//!
//! # Postgres-backed, with the application directory consulted on role writes
//! PERMREG_DATABASE_URL=postgres://localhost/permreg \
//!     permreg-server --directory-url http://apps.internal:8081
//!
//! # Debug logging
//! RUST_LOG=debug permreg-server
//! ```

use anyhow::{Context, Result};
use api_server::{
    server::{Server, ServerConfig},
    state::AppState,
};
use clap::Parser;
use permreg_registry::{
    AllowAllDirectory, ApplicationDirectory, DirectoryFailurePolicy, HttpApplicationDirectory,
    InMemoryRegistryStore, PermissionRegistry, RegistryConfig, RegistryStore, MAX_DEPTH,
};
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Permission registry API server
#[derive(Parser, Debug)]
#[command(
    name = "permreg-server",
    version,
    about = "REST API for roles, role inheritance and permission bundle units",
    long_about = None
)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "PERMREG_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short = 'p', long, default_value = "8080", env = "PERMREG_PORT")]
    port: u16,

    /// Enable JSON logging format
    #[arg(long, env = "PERMREG_JSON_LOGS")]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info", env = "PERMREG_LOG_LEVEL")]
    log_level: String,

    /// Postgres connection string; the in-memory store is used when unset
    #[arg(long, env = "PERMREG_DATABASE_URL")]
    database_url: Option<String>,

    /// Base URL of the application directory service
    #[arg(long, env = "PERMREG_DIRECTORY_URL")]
    directory_url: Option<String>,

    /// Timeout for a single directory lookup
    #[arg(long, default_value = "2000", env = "PERMREG_DIRECTORY_TIMEOUT_MS")]
    directory_timeout_ms: u64,

    /// Behavior when the directory is unreachable (fail-open, fail-closed)
    #[arg(long, default_value = "fail-open", env = "PERMREG_DIRECTORY_FAILURE_POLICY")]
    directory_failure_policy: DirectoryFailurePolicy,

    /// Attempts for a contended graph mutation before reporting a conflict
    #[arg(long, default_value = "5", env = "PERMREG_GRAPH_MAX_RETRIES")]
    graph_max_retries: u32,
}

impl Args {
    fn registry_config(&self) -> RegistryConfig {
        RegistryConfig::default()
            .with_graph_max_retries(self.graph_max_retries)
            .with_directory_failure_policy(self.directory_failure_policy)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting permission registry");

    let store = build_store(&args).await?;
    let directory = build_directory(&args)?;
    let registry = PermissionRegistry::new(store, directory, args.registry_config())
        .context("Failed to initialize registry")?;
    register_process_metrics(&registry);

    info!(
        backend = registry.backend_name(),
        max_depth = MAX_DEPTH,
        directory_failure_policy = %registry.config().directory_failure_policy,
        "Registry initialized"
    );

    let state = Arc::new(AppState::new(registry));
    let server = Server::bind(&ServerConfig::new(&args.host, args.port), state).await?;

    if let Err(e) = server.run().await {
        error!("Server error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn build_store(args: &Args) -> Result<Arc<dyn RegistryStore>> {
    match &args.database_url {
        #[cfg(feature = "postgres")]
        Some(url) => {
            let store = permreg_registry::PostgresRegistryStore::new(url)
                .await
                .context("Failed to connect to Postgres")?;
            store
                .run_migrations()
                .await
                .context("Failed to run migrations")?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => {
            warn!("Built without the postgres feature; ignoring database URL");
            Ok(Arc::new(InMemoryRegistryStore::new()))
        }
        None => Ok(Arc::new(InMemoryRegistryStore::new())),
    }
}

fn build_directory(args: &Args) -> Result<Arc<dyn ApplicationDirectory>> {
    match &args.directory_url {
        Some(url) => {
            let directory = HttpApplicationDirectory::new(
                url,
                Duration::from_millis(args.directory_timeout_ms),
            )?;
            info!(url = %url, "Using application directory");
            Ok(Arc::new(directory))
        }
        None => {
            warn!("No application directory configured; app and module codes are not checked");
            Ok(Arc::new(AllowAllDirectory))
        }
    }
}

#[cfg(target_os = "linux")]
fn register_process_metrics(registry: &PermissionRegistry) {
    let collector = prometheus::process_collector::ProcessCollector::for_self();
    if let Err(e) = registry.metrics().registry().register(Box::new(collector)) {
        warn!(error = %e, "Failed to register process metrics");
    }
}

#[cfg(not(target_os = "linux"))]
fn register_process_metrics(_registry: &PermissionRegistry) {}

fn init_tracing(args: &Args) -> Result<()> {
    let log_level = args.log_level.parse::<tracing::Level>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', using 'info'", args.log_level);
        tracing::Level::INFO
    });
    let http_level = if log_level <= tracing::Level::DEBUG {
        "debug"
    } else {
        "info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "api_server={lvl},permreg_server={lvl},permreg_registry={lvl},tower_http={http},axum={http}",
            lvl = log_level,
            http = http_level
        )
        .into()
    });

    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()?;
    }

    Ok(())
}
