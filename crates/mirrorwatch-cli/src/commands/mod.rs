pub mod cache;
pub mod check;
pub mod daemon;
pub mod sync;

use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::path::Path;
use watched_sync_config::{Config, PathManager};
use watched_sync_core::{NameMapping, SyncOrchestrator, ViewedDateStorage};
use watched_sync_servers::create_servers;

/// Load the config file if it exists; a file that fails to parse is an error
pub fn read_config(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }
    let config = Config::load_from_file(&path.to_path_buf())
        .map_err(|e| eyre!("Failed to load config from {}: {}", path.display(), e))?;
    Ok(Some(config))
}

/// Commands that talk to servers need a valid config
pub fn require_config(config: Option<Config>, path: &Path) -> Result<Config> {
    let config = config.ok_or_else(|| {
        eyre!(
            "Configuration file not found at {}. Create it with at least two [[servers]] entries.",
            path.display()
        )
    })?;
    config
        .validate()
        .map_err(|e| eyre!("Configuration validation failed: {}", e))?;
    Ok(config)
}

pub fn cache_storage(config: Option<&Config>, paths: &PathManager) -> ViewedDateStorage {
    let path = match config {
        Some(config) => config.cache_file(paths),
        None => paths.viewed_cache_file(),
    };
    ViewedDateStorage::new(path)
}

pub fn build_orchestrator(config: &Config, paths: &PathManager) -> Result<SyncOrchestrator> {
    let servers = create_servers(config).map_err(|e| eyre!("Failed to create servers: {}", e))?;
    let storage = cache_storage(Some(config), paths);
    let cache = storage.load(config.cache.ttl_days);

    Ok(SyncOrchestrator::new(servers, cache)
        .with_mapping(NameMapping::from_config(&config.mapping))
        .with_options(config.sync.clone())
        .with_storage(storage))
}
