use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use inference_client::HuggingFace;
use newscred_common::{load_config, FileConfig, Secrets};

use crate::governor::LoadGovernor;
use crate::shutdown::install_shutdown_handler;
use crate::store::PgStore;
use crate::telemetry::init_tracing;

/// Workers run one statement at a time; a second connection covers the
/// odd overlap with pool housekeeping.
const WORKER_POOL_SIZE: u32 = 2;

/// Everything a worker binary needs before it enters its loop.
pub struct WorkerContext {
    pub config: FileConfig,
    pub store: Arc<PgStore>,
    pub backend: Arc<HuggingFace>,
    pub governor: LoadGovernor,
    pub cancel: CancellationToken,
}

/// Resolve and load the TOML config. Fatal if missing or invalid.
pub fn load_file_config(path: &Path) -> Result<(PathBuf, FileConfig)> {
    let path = path.canonicalize().with_context(|| {
        format!(
            "Config file not found: {}. Create one or specify --config <path>",
            path.display()
        )
    })?;
    let config = load_config(&path)?;
    Ok((path, config))
}

/// Config, logging, secrets, store, backend, governor and signal handling,
/// in that order. Any failure here is fatal.
pub async fn start_worker(name: &str, config_path: &Path) -> Result<WorkerContext> {
    let (config_path, config) = load_file_config(config_path)?;
    init_tracing(&config.logging)?;

    info!(worker = name, config = %config_path.display(), "Starting");
    config.log_redacted();

    let secrets = Secrets::from_env()?;
    debug!(?secrets, "Secrets loaded");

    let store = PgStore::connect(&secrets.database_url, WORKER_POOL_SIZE).await?;

    let backend = HuggingFace::new(&secrets.hf_token, config.inference.timeout())
        .context("Failed to build inference client")?
        .with_base_url(&config.inference.base_url);

    let governor = LoadGovernor::from_config(&config.governor);

    let cancel = CancellationToken::new();
    install_shutdown_handler(cancel.clone());

    Ok(WorkerContext {
        config,
        store: Arc::new(store),
        backend: Arc::new(backend),
        governor,
        cancel,
    })
}
