use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Last recorded status of one item for one account on one server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub completed: bool,
    pub time: Option<u64>,
    /// When the status was observed to change at the source
    pub source_viewed_at: DateTime<Utc>,
    /// When this entry was last written
    pub updated_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Same status as an observation: positions must be equal unless completed
    pub fn matches(&self, completed: bool, time: u64) -> bool {
        self.completed == completed && (completed || self.time.unwrap_or(0) == time)
    }
}

type ItemEntries = HashMap<String, CacheEntry>;
type UserEntries = HashMap<String, ItemEntries>;

/// In-memory viewed-date cache keyed by (instance, user, native item key)
///
/// All three key levels are trimmed and lowercased, so the same account or item maps to
/// one bucket whatever casing a server reports. Persistence lives in
/// `ViewedDateStorage`; this type only tracks whether anything changed since the last
/// save.
pub struct ViewedDateCache {
    entries: HashMap<String, UserEntries>,
    ttl: Option<Duration>,
    dirty: bool,
}

impl ViewedDateCache {
    /// `ttl_days <= 0` disables expiry
    pub fn new(ttl_days: i64) -> Self {
        let ttl = if ttl_days > 0 {
            Some(Duration::days(ttl_days))
        } else {
            None
        };
        Self::with_ttl(ttl)
    }

    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        Self {
            entries: HashMap::new(),
            ttl: ttl.filter(|ttl| *ttl > Duration::zero()),
            dirty: false,
        }
    }

    pub fn normalize_key(key: &str) -> String {
        key.trim().to_lowercase()
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn get(&self, instance_id: &str, user_key: &str, native_key: &str) -> Option<&CacheEntry> {
        self.entries
            .get(&Self::normalize_key(instance_id))?
            .get(&Self::normalize_key(user_key))?
            .get(&Self::normalize_key(native_key))
    }

    /// Write or overwrite an entry, stamping `updated_at` with the current time
    pub fn set(
        &mut self,
        instance_id: &str,
        user_key: &str,
        native_key: &str,
        completed: bool,
        time: u64,
        source_viewed_at: DateTime<Utc>,
    ) {
        self.set_at(instance_id, user_key, native_key, completed, time, source_viewed_at, Utc::now());
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_at(
        &mut self,
        instance_id: &str,
        user_key: &str,
        native_key: &str,
        completed: bool,
        time: u64,
        source_viewed_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        let entry = CacheEntry {
            completed,
            time: Some(time),
            source_viewed_at,
            updated_at: now,
        };
        self.bucket_mut(instance_id, user_key)
            .insert(Self::normalize_key(native_key), entry);
        self.dirty = true;
    }

    /// Insert an entry read from disk; a duplicate bucket keeps the newer `updated_at`
    ///
    /// Returns false when the entry lost to one already present. Does not mark the
    /// cache dirty.
    pub fn insert_loaded(
        &mut self,
        instance_id: &str,
        user_key: &str,
        native_key: &str,
        entry: CacheEntry,
    ) -> bool {
        let items = self.bucket_mut(instance_id, user_key);
        let key = Self::normalize_key(native_key);
        match items.get(&key) {
            Some(existing) if existing.updated_at >= entry.updated_at => false,
            _ => {
                items.insert(key, entry);
                true
            }
        }
    }

    fn bucket_mut(&mut self, instance_id: &str, user_key: &str) -> &mut ItemEntries {
        self.entries
            .entry(Self::normalize_key(instance_id))
            .or_default()
            .entry(Self::normalize_key(user_key))
            .or_default()
    }

    /// Provenance timestamp for a fresh observation
    ///
    /// When the cached status still matches the observation, nothing changed at the
    /// source since it was recorded, so the earlier `source_viewed_at` is kept. Otherwise
    /// the server's own "last viewed" is used, or `now` when it has none.
    pub fn resolve_viewed_date(
        observed_last_viewed_at: Option<DateTime<Utc>>,
        completed: bool,
        time: u64,
        cached: Option<&CacheEntry>,
    ) -> DateTime<Utc> {
        Self::resolve_viewed_date_at(observed_last_viewed_at, completed, time, cached, Utc::now())
    }

    pub fn resolve_viewed_date_at(
        observed_last_viewed_at: Option<DateTime<Utc>>,
        completed: bool,
        time: u64,
        cached: Option<&CacheEntry>,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        match cached {
            Some(entry) if entry.matches(completed, time) => entry.source_viewed_at,
            _ => observed_last_viewed_at.unwrap_or(now),
        }
    }

    /// Drop entries whose `updated_at` is older than `now - ttl`; returns how many
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let ttl = match self.ttl {
            Some(ttl) => ttl,
            None => return 0,
        };
        let cutoff = now - ttl;
        let mut pruned = 0;

        for users in self.entries.values_mut() {
            for items in users.values_mut() {
                let before = items.len();
                items.retain(|_, entry| entry.updated_at >= cutoff);
                pruned += before - items.len();
            }
            users.retain(|_, items| !items.is_empty());
        }
        self.entries.retain(|_, users| !users.is_empty());

        pruned
    }

    /// Flattened `(instance, user, item, entry)` view for serialization
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &str, &CacheEntry)> {
        self.entries.iter().flat_map(|(instance, users)| {
            users.iter().flat_map(move |(user, items)| {
                items
                    .iter()
                    .map(move |(item, entry)| (instance.as_str(), user.as_str(), item.as_str(), entry))
            })
        })
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn len(&self) -> usize {
        self.entries
            .values()
            .flat_map(|users| users.values())
            .map(|items| items.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.dirty = true;
        }
    }
}

impl Default for ViewedDateCache {
    fn default() -> Self {
        Self::with_ttl(None)
    }
}
