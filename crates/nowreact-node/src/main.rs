//! Node binary for the nowreact canvas.
//!
//! Wires together configuration, logging, the state store, the background
//! checkpointer, and the HTTP API.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `nowreact-config.yaml` (path overridable via
//!    `NOWREACT_CONFIG`) plus environment overrides
//! 2. Initialize structured logging (tracing)
//! 3. Load the state file; a corrupt or unreadable file aborts startup
//! 4. Start the checkpointer
//! 5. Serve the API until `Ctrl-C` or `SIGTERM`
//! 6. Flush unsaved changes and exit

mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use nowreact_core::config::LoggingConfig;
use nowreact_core::{CheckpointPolicy, Checkpointer, NodeConfig, StateStore, load_from_disk};
use nowreact_server::{AppState, ServerConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::NodeError;

/// Environment variable naming the config file.
const CONFIG_ENV: &str = "NOWREACT_CONFIG";

/// Config file used when `NOWREACT_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "nowreact-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration or the state file cannot be loaded,
/// the server cannot bind, or the final checkpoint fails.
#[tokio::main]
async fn main() -> Result<(), NodeError> {
    // 1. Load configuration.
    let config_path = std::env::var(CONFIG_ENV)
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let (config, from_file) = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    if !from_file {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }
    info!(
        config = %config_path.display(),
        state_path = %config.persistence.state_path().display(),
        grid_size = config.grid.size,
        checkpoint_interval_ms = config.persistence.checkpoint_interval_ms,
        "nowreact-node starting"
    );

    // 3. Load state.
    let store = open_store(&config)?;

    // 4. Start the checkpointer.
    let state_path = config.persistence.state_path();
    let checkpoints = Checkpointer::new(
        Arc::clone(&store),
        &state_path,
        CheckpointPolicy::from(&config.persistence),
    )
    .spawn();

    // 5. Serve until a shutdown signal arrives.
    let server_config = ServerConfig::from(&config.server);
    let app_state = Arc::new(AppState::new(store));
    let served =
        nowreact_server::start_server(&server_config, app_state, shutdown_signal()).await;

    // 6. Flush, even if the server failed, so accepted submissions survive.
    let flushed = checkpoints.shutdown().await;
    served?;
    flushed?;

    info!("nowreact-node shutdown complete");
    Ok(())
}

/// Load configuration, reporting whether it came from a file.
///
/// Runs before logging is installed, so the caller logs the outcome.
fn load_config(path: &Path) -> Result<(NodeConfig, bool), NodeError> {
    let from_file = path.exists();
    Ok((NodeConfig::load_or_default(path)?, from_file))
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
fn init_logging(logging: &LoggingConfig) -> Result<(), NodeError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| NodeError::Logging {
            message: format!("bad log filter {:?}: {e}", logging.level),
        })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| NodeError::Logging {
        message: e.to_string(),
    })
}

/// Load the state file and build the store from it.
///
/// A missing file starts a blank canvas. Any other failure is returned so
/// the node refuses to start rather than silently discarding state.
fn open_store(config: &NodeConfig) -> Result<Arc<StateStore>, NodeError> {
    let size = config.grid.grid_size()?;
    let path = config.persistence.state_path();
    let loaded = load_state(&path, size, &config.grid.namespace)?;
    Ok(Arc::new(StateStore::initialize(
        size,
        &config.grid.namespace,
        Some(loaded),
    )))
}

fn load_state(
    path: &Path,
    size: nowreact_types::GridSize,
    namespace: &str,
) -> Result<nowreact_types::Snapshot, NodeError> {
    match load_from_disk(path, size, namespace) {
        Ok(loaded) => {
            info!(
                restored = loaded.is_restored(),
                path = %path.display(),
                "State loaded"
            );
            Ok(loaded.into_snapshot())
        }
        Err(e) => {
            if e.is_corrupt() {
                warn!(
                    error = %e,
                    path = %path.display(),
                    "State file is corrupt; move it aside to start a fresh canvas"
                );
            }
            Err(e.into())
        }
    }
}

/// Resolve when the process receives `Ctrl-C` or, on Unix, `SIGTERM`.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("Shutdown signal received");
}
