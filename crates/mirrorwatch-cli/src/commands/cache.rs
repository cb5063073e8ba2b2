use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde_json::json;
use std::collections::BTreeMap;
use watched_sync_config::{Config, PathManager};

pub fn run_show(config: Option<&Config>, paths: &PathManager, output: &Output) -> Result<()> {
    let storage = super::cache_storage(config, paths);
    let ttl_days = config.map(|c| c.cache.ttl_days).unwrap_or(30);
    let cache = storage.load(ttl_days);
    let size = storage.size().map_err(|e| eyre!("Failed to stat cache file: {}", e))?;

    let mut per_server: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for (server, _, _, entry) in cache.iter() {
        let counts = per_server.entry(server).or_default();
        counts.0 += 1;
        if entry.completed {
            counts.1 += 1;
        }
    }

    if output.is_human() {
        output.info(format!("Viewed-date cache: {}", storage.path().display()));
        if !storage.exists() {
            output.warn("Cache file does not exist yet");
            return Ok(());
        }
        output.detail(format!("{} entries, {} bytes, ttl {} days", cache.len(), size, ttl_days));
        for (server, (entries, completed)) in &per_server {
            output.detail(format!("{}: {} entries ({} completed)", server, entries, completed));
        }
    } else {
        let servers: BTreeMap<&str, serde_json::Value> = per_server
            .iter()
            .map(|(server, (entries, completed))| {
                (*server, json!({ "entries": entries, "completed": completed }))
            })
            .collect();
        output.json(&json!({
            "path": storage.path().display().to_string(),
            "exists": storage.exists(),
            "size_bytes": size,
            "ttl_days": ttl_days,
            "entries": cache.len(),
            "servers": servers,
        }));
    }

    Ok(())
}

pub fn run_clear(config: Option<&Config>, paths: &PathManager, output: &Output) -> Result<()> {
    let storage = super::cache_storage(config, paths);
    if !storage.exists() {
        output.info("Viewed-date cache is already empty");
        return Ok(());
    }
    storage
        .clear()
        .map_err(|e| eyre!("Failed to clear viewed-date cache: {}", e))?;
    output.success(format!("Removed {}", storage.path().display()));
    Ok(())
}
