pub mod config;
pub mod paths;

pub use config::{
    default_scheduler_config, CacheConfig, Config, LoggingConfig, MappingConfig, SchedulerConfig,
    ServerConfig, ServerKind, SyncMode, SyncOptions,
};
pub use paths::{container_base_path, PathManager};
