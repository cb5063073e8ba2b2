use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
    #[serde(default)]
    pub sync: SyncOptions,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
    #[serde(default)]
    pub scheduler: Option<SchedulerConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    Jellyfin,
    Emby,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Instance id; also the first level of the viewed-date cache
    pub name: String,
    pub kind: ServerKind,
    pub url: String,
    pub token: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Other servers may write watched state into this one
    #[serde(default = "default_true")]
    pub accept_updates: bool,
    /// This server's watched state may be written into others
    #[serde(default = "default_true")]
    pub share_updates: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Last-write-wins action list, both directions
    Actions,
    /// Push-list filtering: each side only pushes what the other is missing
    Push,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SyncOptions {
    #[serde(default = "default_sync_mode")]
    pub mode: SyncMode,
    #[serde(default)]
    pub dryrun: bool,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_true")]
    pub sync_watched: bool,
    #[serde(default = "default_true")]
    pub sync_progress: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Entries not refreshed for this many days are pruned; `<= 0` keeps everything
    #[serde(default = "default_ttl_days")]
    pub ttl_days: i64,
}

/// Name equivalences between servers, looked up in both directions
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct MappingConfig {
    #[serde(default)]
    pub users: BTreeMap<String, String>,
    #[serde(default)]
    pub libraries: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_schedule")]
    pub schedule: String,
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_sync_mode() -> SyncMode {
    SyncMode::Actions
}

fn default_max_workers() -> usize {
    4
}

fn default_ttl_days() -> i64 {
    30
}

fn default_schedule() -> String {
    // tokio-cron-scheduler expects a seconds field
    "0 */15 * * * *".to_string()
}

pub fn default_scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        schedule: default_schedule(),
        run_on_startup: default_true(),
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            mode: default_sync_mode(),
            dryrun: false,
            max_workers: default_max_workers(),
            sync_watched: default_true(),
            sync_progress: default_true(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            ttl_days: default_ttl_days(),
        }
    }
}

impl Config {
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save_to_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// `MIRRORWATCH_DRYRUN=true|1` forces dry-run regardless of the file
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("MIRRORWATCH_DRYRUN") {
            let value = value.trim().to_lowercase();
            if value == "true" || value == "1" {
                debug!("MIRRORWATCH_DRYRUN set, forcing dry-run");
                self.sync.dryrun = true;
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let enabled = self.enabled_servers();
        if enabled.len() < 2 {
            return Err(anyhow::anyhow!(
                "At least two enabled servers are required, found {}",
                enabled.len()
            ));
        }

        let mut seen = HashSet::new();
        for server in &enabled {
            let name = server.name.trim().to_lowercase();
            if name.is_empty() {
                return Err(anyhow::anyhow!("Server name cannot be empty"));
            }
            if !seen.insert(name) {
                return Err(anyhow::anyhow!("Duplicate server name: {}", server.name));
            }
            if server.url.trim().is_empty() {
                return Err(anyhow::anyhow!("Server '{}' has no url configured", server.name));
            }
            if server.token.trim().is_empty() {
                return Err(anyhow::anyhow!("Server '{}' has no token configured", server.name));
            }
        }

        if self.sync.max_workers == 0 {
            return Err(anyhow::anyhow!("max_workers must be at least 1"));
        }

        Ok(())
    }

    pub fn enabled_servers(&self) -> Vec<&ServerConfig> {
        self.servers.iter().filter(|s| s.enabled).collect()
    }

    /// Resolved cache file: explicit `[cache] path` or the default under the data dir
    pub fn cache_file(&self, paths: &crate::PathManager) -> PathBuf {
        self.cache
            .path
            .clone()
            .unwrap_or_else(|| paths.viewed_cache_file())
    }
}
