use color_eyre::Result;
use std::sync::Arc;
use stream_detect_config::{DetectorConfig, PathManager};
use stream_detect_core::ServiceRegistry;

pub mod classify;
pub mod history;
pub mod maintenance;
pub mod services;
pub mod watch;

/// Shared wiring every subcommand needs: the loaded config and a
/// registry rooted in the data directory.
pub(crate) struct AppContext {
    pub config: DetectorConfig,
    pub registry: Arc<ServiceRegistry>,
}

pub(crate) fn app_context() -> Result<AppContext> {
    let paths = PathManager::new()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to resolve application directories: {}", e))?;
    paths
        .ensure_directories()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to create application directories: {}", e))?;
    let config = DetectorConfig::load_or_default(&paths.config_file()).map_err(|e| {
        color_eyre::eyre::eyre!(
            "Failed to load config from {}: {}",
            paths.config_file().display(),
            e
        )
    })?;
    let registry = Arc::new(ServiceRegistry::new(&paths, config.discovery.clone()));
    Ok(AppContext { config, registry })
}
