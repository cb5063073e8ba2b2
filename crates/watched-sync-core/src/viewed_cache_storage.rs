use crate::viewed_cache::{CacheEntry, ViewedDateCache};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// JSON file backing the viewed-date cache
///
/// Layout is `{ instance: { user: { item: { completed, time, source_viewed_at, updated_at } } } }`.
/// Loading never fails: a missing or unreadable file yields an empty cache and
/// malformed branches are dropped. Saving writes the whole document to a temp file
/// and renames it over the old one.
pub struct ViewedDateStorage {
    cache_path: PathBuf,
}

#[derive(Serialize)]
struct StoredEntry {
    completed: bool,
    time: Option<u64>,
    source_viewed_at: String,
    updated_at: String,
}

type Document = BTreeMap<String, BTreeMap<String, BTreeMap<String, StoredEntry>>>;

impl ViewedDateStorage {
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.cache_path
    }

    pub fn exists(&self) -> bool {
        self.cache_path.exists()
    }

    /// Load the cache; `ttl_days <= 0` disables expiry
    pub fn load(&self, ttl_days: i64) -> ViewedDateCache {
        let mut cache = ViewedDateCache::new(ttl_days);

        if !self.cache_path.exists() {
            debug!("Viewed-date cache {:?} does not exist, starting empty", self.cache_path);
            return cache;
        }

        let raw = match std::fs::read_to_string(&self.cache_path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to read viewed-date cache {:?}: {}. Starting empty.", self.cache_path, e);
                return cache;
            }
        };

        let document: Value = match serde_json::from_str(&raw) {
            Ok(document) => document,
            Err(e) => {
                self.backup_unreadable(&e.to_string());
                return cache;
            }
        };

        let instances = match document {
            Value::Object(instances) => instances,
            other => {
                warn!(
                    "Viewed-date cache {:?} has a top-level {} instead of an object. Starting empty.",
                    self.cache_path,
                    type_name(&other)
                );
                return cache;
            }
        };

        let mut dropped = 0usize;
        let mut superseded = 0usize;

        for (instance, users) in &instances {
            let users = match users.as_object() {
                Some(users) => users,
                None => {
                    dropped += 1;
                    continue;
                }
            };
            for (user, items) in users {
                let items = match items.as_object() {
                    Some(items) => items,
                    None => {
                        dropped += 1;
                        continue;
                    }
                };
                for (item, raw_entry) in items {
                    match parse_entry(raw_entry) {
                        Some(entry) => {
                            if !cache.insert_loaded(instance, user, item, entry) {
                                superseded += 1;
                            }
                        }
                        None => dropped += 1,
                    }
                }
            }
        }

        if dropped > 0 {
            warn!(
                "Dropped {} malformed entries while loading viewed-date cache {:?}",
                dropped, self.cache_path
            );
        }
        if superseded > 0 {
            debug!("{} duplicate viewed-date entries superseded by newer ones", superseded);
        }
        info!("Loaded viewed-date cache: {} entries from {:?}", cache.len(), self.cache_path);

        cache
    }

    fn backup_unreadable(&self, error: &str) {
        let backup_path = self.cache_path.with_extension("json.bak");
        match std::fs::copy(&self.cache_path, &backup_path) {
            Ok(_) => warn!(
                "Viewed-date cache is not valid JSON ({}). Backed up to {:?} and starting empty.",
                error, backup_path
            ),
            Err(backup_err) => warn!(
                "Viewed-date cache is not valid JSON ({}) and backup failed: {}. Starting empty.",
                error, backup_err
            ),
        }
    }

    /// Prune expired entries and rewrite the file if anything changed
    ///
    /// Returns whether the file was written.
    pub fn save(&self, cache: &mut ViewedDateCache) -> Result<bool> {
        self.save_at(cache, Utc::now())
    }

    pub fn save_at(&self, cache: &mut ViewedDateCache, now: DateTime<Utc>) -> Result<bool> {
        let pruned = cache.prune_expired(now);
        if pruned > 0 {
            debug!("Pruned {} expired viewed-date entries", pruned);
        }
        if !cache.is_dirty() && pruned == 0 {
            debug!("Viewed-date cache unchanged, skipping save");
            return Ok(false);
        }

        let start = std::time::Instant::now();
        let mut document = Document::new();
        for (instance, user, item, entry) in cache.iter() {
            document
                .entry(instance.to_string())
                .or_default()
                .entry(user.to_string())
                .or_default()
                .insert(
                    item.to_string(),
                    StoredEntry {
                        completed: entry.completed,
                        time: entry.time,
                        source_viewed_at: format_timestamp(&entry.source_viewed_at),
                        updated_at: format_timestamp(&entry.updated_at),
                    },
                );
        }
        let serialized = serde_json::to_string_pretty(&document)
            .context("Failed to serialize viewed-date cache")?;

        if let Some(parent) = self.cache_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache directory {:?}", parent))?;
        }

        // Atomic write: write to temp file, then rename
        let temp_path = self.cache_path.with_extension("json.tmp");
        std::fs::write(&temp_path, serialized)
            .with_context(|| format!("Failed to write {:?}", temp_path))?;
        std::fs::rename(&temp_path, &self.cache_path)
            .with_context(|| format!("Failed to replace {:?}", self.cache_path))?;

        cache.mark_clean();
        info!(
            "Saved viewed-date cache: {} entries in {:?}",
            cache.len(),
            start.elapsed()
        );
        Ok(true)
    }

    /// Delete the cache file
    pub fn clear(&self) -> Result<()> {
        if self.cache_path.exists() {
            std::fs::remove_file(&self.cache_path)
                .with_context(|| format!("Failed to remove {:?}", self.cache_path))?;
            info!("Removed viewed-date cache {:?}", self.cache_path);
        }
        Ok(())
    }

    pub fn size(&self) -> Result<u64> {
        if self.cache_path.exists() {
            Ok(std::fs::metadata(&self.cache_path)?.len())
        } else {
            Ok(0)
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn parse_entry(value: &Value) -> Option<CacheEntry> {
    let fields = value.as_object()?;
    let completed = fields.get("completed")?.as_bool()?;
    let time = match fields.get("time") {
        None | Some(Value::Null) => None,
        Some(time) => Some(time.as_u64()?),
    };
    let source_viewed_at = parse_timestamp(fields.get("source_viewed_at")?.as_str()?)?;
    let updated_at = parse_timestamp(fields.get("updated_at")?.as_str()?)?;

    Some(CacheEntry {
        completed,
        time,
        source_viewed_at,
        updated_at,
    })
}

/// RFC 3339, or a bare ISO-8601 date-time taken as UTC
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub(crate) fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
