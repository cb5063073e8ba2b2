use crate::diff::{cleanup, push_actions};
use crate::mapping::NameMapping;
use crate::provenance::{record_applied, stamp_snapshot};
use crate::resolution::sync_actions;
use crate::viewed_cache::ViewedDateCache;
use crate::viewed_cache_storage::ViewedDateStorage;
use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};
use watched_sync_config::{SyncMode, SyncOptions};
use watched_sync_models::{ActionKind, SyncAction, WatchedSnapshot};
use watched_sync_servers::{MediaServer, SourceError};

/// Runs fetch → reconcile → apply across every pair of configured servers
///
/// Owns the viewed-date cache for its whole lifetime; nothing else writes to it while
/// a cycle runs.
pub struct SyncOrchestrator {
    servers: Vec<Arc<dyn MediaServer>>,
    mapping: NameMapping,
    options: SyncOptions,
    cache: ViewedDateCache,
    storage: Option<ViewedDateStorage>,
}

#[derive(Debug, Default)]
pub struct SyncResult {
    pub servers_fetched: usize,
    pub pairs_processed: usize,
    pub actions_planned: usize,
    pub actions_applied: usize,
    pub actions_failed: usize,
    pub actions: Vec<SyncAction>,
    pub errors: Vec<String>,
    pub dry_run: bool,
    pub duration: Duration,
}

impl SyncOrchestrator {
    pub fn new(servers: Vec<Arc<dyn MediaServer>>, cache: ViewedDateCache) -> Self {
        Self {
            servers,
            mapping: NameMapping::default(),
            options: SyncOptions::default(),
            cache,
            storage: None,
        }
    }

    pub fn with_mapping(mut self, mapping: NameMapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Persist the cache to `storage` at the end of every cycle
    pub fn with_storage(mut self, storage: ViewedDateStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Compute and log actions without dispatching them
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.options.dryrun = dry_run;
        self
    }

    pub fn cache(&self) -> &ViewedDateCache {
        &self.cache
    }

    pub fn server_names(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.instance_id()).collect()
    }

    #[instrument(skip(self))]
    pub async fn run_cycle(&mut self) -> Result<SyncResult> {
        let start = Instant::now();
        let mut result = SyncResult {
            dry_run: self.options.dryrun,
            ..SyncResult::default()
        };

        info!(
            operation = "sync_start",
            servers = ?self.server_names(),
            mode = ?self.options.mode,
            dryrun = self.options.dryrun,
            "Starting sync cycle"
        );

        let mut snapshots = self.fetch_all(&mut result).await;
        result.servers_fetched = snapshots.iter().filter(|s| s.is_some()).count();

        let now = Utc::now();
        for snapshot in snapshots.iter_mut().flatten() {
            stamp_snapshot(&mut self.cache, snapshot, now);
        }

        for i in 0..self.servers.len() {
            for j in (i + 1)..self.servers.len() {
                if snapshots[i].is_none() || snapshots[j].is_none() {
                    continue;
                }
                result.pairs_processed += 1;
                self.process_pair(i, j, &mut snapshots, &mut result).await;
            }
        }

        if let Some(storage) = &self.storage {
            storage
                .save(&mut self.cache)
                .context("Failed to persist viewed-date cache")?;
        }

        result.duration = start.elapsed();
        info!(
            operation = "sync_complete",
            duration_ms = result.duration.as_millis() as u64,
            pairs = result.pairs_processed,
            planned = result.actions_planned,
            applied = result.actions_applied,
            failed = result.actions_failed,
            errors = result.errors.len(),
            "Sync cycle completed"
        );

        Ok(result)
    }

    /// Fetch every server concurrently; a failed server sits out the cycle
    async fn fetch_all(&self, result: &mut SyncResult) -> Vec<Option<WatchedSnapshot>> {
        let fetches = self.servers.iter().map(|server| async move {
            let fetch_start = Instant::now();
            let fetched = server.fetch_watched().await;
            (fetched, fetch_start.elapsed())
        });

        let mut snapshots = Vec::with_capacity(self.servers.len());
        for (server, (fetched, elapsed)) in self.servers.iter().zip(join_all(fetches).await) {
            match fetched {
                Ok(snapshot) => {
                    info!(
                        operation = "fetch",
                        server = server.instance_id(),
                        users = snapshot.users.len(),
                        items = snapshot.item_count(),
                        duration_ms = elapsed.as_millis() as u64,
                        "Fetched watched state from {}",
                        server.instance_id()
                    );
                    snapshots.push(Some(snapshot));
                }
                Err(e) => {
                    error!(
                        operation = "fetch",
                        server = server.instance_id(),
                        status = "error",
                        error = %e,
                        "Failed to fetch watched state from {}",
                        server.instance_id()
                    );
                    result
                        .errors
                        .push(format!("Failed to fetch from {}: {}", server.instance_id(), e));
                    snapshots.push(None);
                }
            }
        }
        snapshots
    }

    async fn process_pair(
        &mut self,
        i: usize,
        j: usize,
        snapshots: &mut [Option<WatchedSnapshot>],
        result: &mut SyncResult,
    ) {
        let (name_i, name_j) = (
            self.servers[i].instance_id().to_string(),
            self.servers[j].instance_id().to_string(),
        );

        let planned = match (&snapshots[i], &snapshots[j]) {
            (Some(list_1), Some(list_2)) => match self.plan(list_1, list_2) {
                Ok(planned) => planned,
                Err(e) => {
                    warn!(
                        operation = "reconcile",
                        server_1 = %name_i,
                        server_2 = %name_j,
                        error = %e,
                        "Skipping pair"
                    );
                    result.errors.push(format!("{} <-> {}: {}", name_i, name_j, e));
                    return;
                }
            },
            _ => return,
        };

        let actions: Vec<SyncAction> = planned
            .into_iter()
            .filter(|action| self.allowed(action, i, j))
            .collect();

        info!(
            operation = "reconcile",
            server_1 = %name_i,
            server_2 = %name_j,
            actions = actions.len(),
            "Reconciled {} <-> {}",
            name_i,
            name_j
        );

        for action in actions {
            result.actions_planned += 1;
            let target_index = if action.target.server == name_i { i } else { j };

            if self.options.dryrun {
                info!(
                    operation = "dry_run",
                    server = %action.target.server,
                    user = %action.user_key,
                    action = %action.kind,
                    "Dry run: would {}",
                    action
                );
                result.actions.push(action);
                continue;
            }

            match dispatch(self.servers[target_index].as_ref(), &action).await {
                Ok(()) => {
                    info!(
                        operation = "apply",
                        server = %action.target.server,
                        user = %action.user_key,
                        action = %action.kind,
                        "Applied: {}",
                        action
                    );
                    record_applied(&mut self.cache, &action, Utc::now());
                    if let Some(snapshot) = snapshots[target_index].as_mut() {
                        reflect_applied(snapshot, &action);
                    }
                    result.actions_applied += 1;
                }
                Err(e) => {
                    error!(
                        operation = "apply",
                        server = %action.target.server,
                        user = %action.user_key,
                        action = %action.kind,
                        status = "error",
                        error = %e,
                        "Failed: {}",
                        action
                    );
                    result.errors.push(format!("Failed to {}: {}", action, e));
                    result.actions_failed += 1;
                }
            }
            result.actions.push(action);
        }
    }

    fn plan(&self, list_1: &WatchedSnapshot, list_2: &WatchedSnapshot) -> Result<Vec<SyncAction>> {
        match self.options.mode {
            SyncMode::Actions => Ok(sync_actions(list_1, list_2, &self.mapping)?),
            SyncMode::Push => {
                let mut actions = push_actions(&cleanup(list_1, list_2, &self.mapping), list_2, &self.mapping);
                actions.extend(push_actions(&cleanup(list_2, list_1, &self.mapping), list_1, &self.mapping));
                Ok(actions)
            }
        }
    }

    /// Directionality toggles and per-kind switches
    fn allowed(&self, action: &SyncAction, i: usize, j: usize) -> bool {
        let (target, source) = if action.target.server == self.servers[i].instance_id() {
            (&self.servers[i], &self.servers[j])
        } else {
            (&self.servers[j], &self.servers[i])
        };

        if !target.accepts_updates() || !source.shares_updates() {
            debug!(
                "Dropping {}: {} -> {} disabled",
                action,
                source.instance_id(),
                target.instance_id()
            );
            return false;
        }

        match action.kind {
            ActionKind::MarkWatched | ActionKind::MarkUnwatched => self.options.sync_watched,
            ActionKind::SetPlaybackPosition { .. } => self.options.sync_progress,
        }
    }
}

async fn dispatch(server: &dyn MediaServer, action: &SyncAction) -> Result<(), SourceError> {
    match action.kind {
        ActionKind::MarkWatched => server.mark_watched(&action.target).await,
        ActionKind::MarkUnwatched => server.mark_unwatched(&action.target).await,
        ActionKind::SetPlaybackPosition { seconds } => server.set_playback_position(&action.target, seconds).await,
    }
}

/// Make later pairs in the same cycle see the write that just succeeded
fn reflect_applied(snapshot: &mut WatchedSnapshot, action: &SyncAction) {
    snapshot.for_each_item_mut(|_, item| {
        if item.source != action.target {
            return;
        }
        let status = &mut item.status;
        match action.kind {
            ActionKind::MarkWatched => status.completed = true,
            ActionKind::MarkUnwatched => {
                status.completed = false;
                status.time = 0;
            }
            ActionKind::SetPlaybackPosition { seconds } => {
                status.completed = false;
                status.time = seconds * 1000;
            }
        }
        status.viewed_date = action.authoritative.viewed_date;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use watched_sync_models::{LibraryData, MediaIdentifiers, MediaItem, SourceRef, UserData, WatchedStatus};

    struct FakeServer {
        name: String,
        snapshot: Option<WatchedSnapshot>,
        accept_updates: bool,
        share_updates: bool,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl FakeServer {
        fn new(name: &str, movies: Vec<MediaItem>) -> Self {
            let mut library = LibraryData::new("Movies");
            library.movies = movies;
            let mut user = UserData::default();
            user.libraries.insert("Movies".to_string(), library);
            let mut snapshot = WatchedSnapshot::new(name);
            snapshot.users.insert("alice".to_string(), user);

            Self {
                name: name.to_string(),
                snapshot: Some(snapshot),
                accept_updates: true,
                share_updates: true,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn unreachable(name: &str) -> Self {
            let mut server = Self::new(name, Vec::new());
            server.snapshot = None;
            server
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: &str, target: &SourceRef) {
            self.calls
                .lock()
                .unwrap()
                .push((call.to_string(), target.item_id.clone()));
        }
    }

    #[async_trait]
    impl MediaServer for FakeServer {
        fn instance_id(&self) -> &str {
            &self.name
        }

        fn accepts_updates(&self) -> bool {
            self.accept_updates
        }

        fn shares_updates(&self) -> bool {
            self.share_updates
        }

        async fn fetch_watched(&self) -> Result<WatchedSnapshot, SourceError> {
            self.snapshot
                .clone()
                .ok_or_else(|| SourceError::new(format!("{} is offline", self.name)))
        }

        async fn mark_watched(&self, target: &SourceRef) -> Result<(), SourceError> {
            self.record("mark_watched", target);
            Ok(())
        }

        async fn mark_unwatched(&self, target: &SourceRef) -> Result<(), SourceError> {
            self.record("mark_unwatched", target);
            Ok(())
        }

        async fn set_playback_position(&self, target: &SourceRef, seconds: u64) -> Result<(), SourceError> {
            self.record(&format!("set_playback_position:{}", seconds), target);
            Ok(())
        }
    }

    fn t() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 10, 21, 0, 0).unwrap()
    }

    fn movie_a(server: &str, completed: bool, time: u64, viewed: DateTime<Utc>) -> MediaItem {
        MediaItem {
            identifiers: MediaIdentifiers::new().with_title("Movie A").with_imdb("tt0000001"),
            status: WatchedStatus::observed(completed, time, Some(viewed), viewed),
            source: SourceRef::new(server, format!("{}-alice", server), format!("{}-a", server)),
        }
    }

    /// As an adapter builds it when the server has no "last played" date
    fn undated_movie_a(server: &str, completed: bool, time: u64, fetched_at: DateTime<Utc>) -> MediaItem {
        MediaItem {
            status: WatchedStatus::observed(completed, time, None, fetched_at),
            ..movie_a(server, completed, time, fetched_at)
        }
    }

    fn orchestrator(servers: Vec<Arc<FakeServer>>) -> SyncOrchestrator {
        let servers: Vec<Arc<dyn MediaServer>> = servers
            .into_iter()
            .map(|s| s as Arc<dyn MediaServer>)
            .collect();
        SyncOrchestrator::new(servers, ViewedDateCache::new(30))
    }

    #[tokio::test]
    async fn test_newer_watch_is_applied_to_other_server() {
        let one = Arc::new(FakeServer::new("one", vec![movie_a("one", true, 0, t())]));
        let two = Arc::new(FakeServer::new(
            "two",
            vec![movie_a("two", false, 400_000, t() - ChronoDuration::seconds(1))],
        ));

        let mut sync = orchestrator(vec![one.clone(), two.clone()]);
        let result = sync.run_cycle().await.unwrap();

        assert_eq!(result.pairs_processed, 1);
        assert_eq!(result.actions_applied, 1);
        assert!(result.errors.is_empty());
        assert!(one.calls().is_empty());
        assert_eq!(two.calls(), vec![("mark_watched".to_string(), "two-a".to_string())]);

        let entry = sync.cache().get("two", "alice", "two-a").unwrap();
        assert!(entry.completed);
        assert_eq!(entry.source_viewed_at, t());
    }

    #[tokio::test]
    async fn test_dry_run_plans_but_does_not_dispatch() {
        let one = Arc::new(FakeServer::new("one", vec![movie_a("one", true, 0, t())]));
        let two = Arc::new(FakeServer::new(
            "two",
            vec![movie_a("two", false, 400_000, t() - ChronoDuration::hours(1))],
        ));

        let mut sync = orchestrator(vec![one.clone(), two.clone()]).with_dry_run(true);
        let result = sync.run_cycle().await.unwrap();

        assert!(result.dry_run);
        assert_eq!(result.actions_planned, 1);
        assert_eq!(result.actions_applied, 0);
        assert_eq!(result.actions[0].kind, ActionKind::MarkWatched);
        assert!(two.calls().is_empty());
        // observations are still recorded
        assert!(!sync.cache().get("two", "alice", "two-a").unwrap().completed);
    }

    #[tokio::test]
    async fn test_target_refusing_updates_is_left_alone() {
        let one = Arc::new(FakeServer::new("one", vec![movie_a("one", true, 0, t())]));
        let mut two = FakeServer::new("two", vec![movie_a("two", false, 400_000, t() - ChronoDuration::hours(1))]);
        two.accept_updates = false;
        let two = Arc::new(two);

        let mut sync = orchestrator(vec![one, two.clone()]);
        let result = sync.run_cycle().await.unwrap();

        assert_eq!(result.actions_planned, 0);
        assert!(two.calls().is_empty());
    }

    #[tokio::test]
    async fn test_progress_switch_drops_position_updates() {
        let one = Arc::new(FakeServer::new("one", vec![movie_a("one", false, 900_000, t())]));
        let two = Arc::new(FakeServer::new(
            "two",
            vec![movie_a("two", false, 300_000, t() - ChronoDuration::hours(1))],
        ));

        let options = SyncOptions {
            sync_progress: false,
            ..SyncOptions::default()
        };
        let mut sync = orchestrator(vec![one, two.clone()]).with_options(options);
        let result = sync.run_cycle().await.unwrap();

        assert_eq!(result.actions_planned, 0);
        assert!(two.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_sits_out() {
        let one = Arc::new(FakeServer::new("one", vec![movie_a("one", true, 0, t())]));
        let two = Arc::new(FakeServer::unreachable("two"));

        let mut sync = orchestrator(vec![one, two]);
        let result = sync.run_cycle().await.unwrap();

        assert_eq!(result.servers_fetched, 1);
        assert_eq!(result.pairs_processed, 0);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("two"));
    }

    #[tokio::test]
    async fn test_later_pairs_see_earlier_writes() {
        let one = Arc::new(FakeServer::new("one", vec![movie_a("one", true, 0, t())]));
        let two = Arc::new(FakeServer::new(
            "two",
            vec![movie_a("two", false, 120_000, t() - ChronoDuration::hours(1))],
        ));
        let three = Arc::new(FakeServer::new(
            "three",
            vec![movie_a("three", false, 240_000, t() - ChronoDuration::hours(2))],
        ));

        let mut sync = orchestrator(vec![one, two.clone(), three.clone()]);
        let result = sync.run_cycle().await.unwrap();

        assert_eq!(result.pairs_processed, 3);
        assert_eq!(result.actions_applied, 2);
        assert_eq!(two.calls().len(), 1);
        assert_eq!(three.calls(), vec![("mark_watched".to_string(), "three-a".to_string())]);
    }

    #[tokio::test]
    async fn test_push_mode_and_cache_persistence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("viewed_dates.json");

        let one = Arc::new(FakeServer::new("one", vec![movie_a("one", false, 1_800_000, t())]));
        let two = Arc::new(FakeServer::new("two", vec![movie_a("two", true, 0, t() - ChronoDuration::days(1))]));

        let options = SyncOptions {
            mode: SyncMode::Push,
            ..SyncOptions::default()
        };
        let mut sync = orchestrator(vec![one.clone(), two.clone()])
            .with_options(options)
            .with_storage(ViewedDateStorage::new(&path));
        let result = sync.run_cycle().await.unwrap();

        // push mode only ever moves state forward
        assert_eq!(result.actions_applied, 1);
        assert_eq!(one.calls(), vec![("mark_watched".to_string(), "one-a".to_string())]);
        assert!(two.calls().is_empty());

        let reloaded = ViewedDateStorage::new(&path).load(30);
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.get("one", "alice", "one-a").unwrap().completed);
    }

    #[tokio::test]
    async fn test_undated_first_sighting_is_left_alone() {
        // each adapter saw the item at a different instant
        let one = Arc::new(FakeServer::new("one", vec![undated_movie_a("one", true, 0, t())]));
        let two = Arc::new(FakeServer::new(
            "two",
            vec![undated_movie_a("two", false, 600_000, t() + ChronoDuration::seconds(3))],
        ));

        let mut sync = orchestrator(vec![one.clone(), two.clone()]);
        let result = sync.run_cycle().await.unwrap();

        assert_eq!(result.pairs_processed, 1);
        assert_eq!(result.actions_planned, 0);
        assert!(one.calls().is_empty());
        assert!(two.calls().is_empty());

        let watched = sync.cache().get("one", "alice", "one-a").unwrap();
        let partial = sync.cache().get("two", "alice", "two-a").unwrap();
        assert_eq!(watched.source_viewed_at, partial.source_viewed_at);

        let result = sync.run_cycle().await.unwrap();
        assert_eq!(result.actions_planned, 0);
        assert!(one.calls().is_empty());
    }
}
