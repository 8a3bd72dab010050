mod settings;

use clap::Parser;
use pkg_api::AppState;
use pkg_api::server::{bind, start_server};
use pkg_constants::paths::DEFAULT_CONFIG;
use pkg_controllers::endpoints_sync::EndpointsSyncController;
use pkg_controllers::reconciler::Reconciler;
use pkg_controllers::source::{LabelQuerySource, ServiceSource, StaticSource};
use pkg_state::client::StateStore;
use pkg_state::registry::Registry;
use pkg_state::remote::RemoteRegistry;
use pkg_types::config::{LogFormat, SourceMode, SyncConfigFile, load_config_file};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(
    name = "node-endpoints",
    about = "Publishes Endpoints for Services backed by a pool of nodes"
)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = DEFAULT_CONFIG)]
    config: String,

    /// Address to listen on for HTTP metrics requests
    #[arg(long)]
    listen_address: Option<String>,

    /// Directory of the local SlateDB registry (used without --api-server)
    #[arg(long)]
    data_dir: Option<String>,

    /// Base URL of the registry API server, e.g. https://10.0.0.1:6443
    #[arg(long)]
    api_server: Option<String>,

    /// File holding the bearer token for --api-server
    #[arg(long)]
    token_file: Option<String>,

    /// Where managed Services come from: `static` or `label-query`
    #[arg(long)]
    mode: Option<SourceMode>,

    /// Seconds between sync cycles
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Seconds the metrics listener may take to drain on shutdown
    #[arg(long)]
    shutdown_grace_secs: Option<u64>,

    /// Log filter, e.g. `info` or `pkg_controllers=debug` (RUST_LOG wins)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output: `json` or `text`
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Service for the scheduler role (namespace/name)
    #[arg(long)]
    scheduler_service: Option<String>,

    /// Node label selector for the scheduler role
    #[arg(long)]
    scheduler_node_label: Option<String>,

    /// Service for the controller-manager role (namespace/name)
    #[arg(long)]
    controller_manager_service: Option<String>,

    /// Node label selector for the controller-manager role
    #[arg(long)]
    controller_manager_node_label: Option<String>,
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.compact().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config file (returns defaults if file not found)
    let config_path = cli.config.clone();
    let file_cfg: SyncConfigFile = load_config_file(&config_path)?;
    let settings = Settings::resolve(cli, file_cfg)?;

    init_tracing(&settings.log_level, settings.log_format);
    info!("Config file: {}", config_path);
    settings.log();

    let (registry, store) = open_registry(&settings).await?;

    // Malformed roles stop us here, before the listener starts.
    let source = match settings.mode {
        SourceMode::Static => {
            let source = StaticSource::new(registry.clone(), &settings.roles)
                .inspect_err(|e| error!("{}", e))?;
            if source.targets().is_empty() {
                warn!("No roles configured, nothing will be synced");
            }
            ServiceSource::Static(source)
        }
        SourceMode::LabelQuery => ServiceSource::LabelQuery(LabelQuerySource::new(registry.clone())),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let listener = bind(settings.listen_address).await?;
    let server = tokio::spawn(start_server(listener, AppState::new(), shutdown_rx.clone()));

    let controller = EndpointsSyncController::new(Reconciler::new(registry, source), settings.interval)
        .start(shutdown_rx);

    shutdown_signal().await;
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);

    let drain = async {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Metrics server error: {}", e),
            Err(e) => error!("Metrics server task failed: {}", e),
        }
        if let Err(e) = controller.await {
            error!("EndpointsSyncController task failed: {}", e);
        }
    };
    if tokio::time::timeout(settings.shutdown_grace, drain)
        .await
        .is_err()
    {
        warn!(
            "Shutdown grace period of {}s elapsed, exiting",
            settings.shutdown_grace.as_secs()
        );
        return Ok(());
    }

    if let Some(store) = store {
        store.close().await?;
    }
    info!("Shutdown complete");
    Ok(())
}

/// The API server when one is configured, otherwise the local store (also
/// returned so it can be closed on shutdown).
async fn open_registry(
    settings: &Settings,
) -> anyhow::Result<(Arc<dyn Registry>, Option<StateStore>)> {
    let Some(server) = &settings.api_server else {
        let store = StateStore::new(&settings.data_dir).await?;
        let registry: Arc<dyn Registry> = Arc::new(store.clone());
        return Ok((registry, Some(store)));
    };

    let token = match &settings.token_file {
        Some(path) => {
            let token = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to read token file {}: {}", path, e))?;
            Some(token.trim().to_string())
        }
        None => None,
    };
    let registry: Arc<dyn Registry> = Arc::new(RemoteRegistry::new(server, token)?);
    Ok((registry, None))
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
