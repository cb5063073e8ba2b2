use crate::error::SourceError;
use crate::jellyfin::JellyfinServer;
use crate::traits::MediaServer;
use std::sync::Arc;
use tracing::info;
use watched_sync_config::{Config, ServerKind};

/// Build an adapter for every enabled server in the configuration
pub fn create_servers(config: &Config) -> Result<Vec<Arc<dyn MediaServer>>, SourceError> {
    let mut servers: Vec<Arc<dyn MediaServer>> = Vec::new();

    for server in config.enabled_servers() {
        let adapter: Arc<dyn MediaServer> = match server.kind {
            ServerKind::Jellyfin | ServerKind::Emby => {
                Arc::new(JellyfinServer::new(server, config.sync.max_workers)?)
            }
        };
        info!("Configured {:?} server '{}' at {}", server.kind, server.name, server.url);
        servers.push(adapter);
    }

    Ok(servers)
}
