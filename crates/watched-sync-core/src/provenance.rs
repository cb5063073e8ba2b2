use crate::viewed_cache::ViewedDateCache;
use chrono::{DateTime, Utc};
use tracing::debug;
use watched_sync_models::{ActionKind, SyncAction, WatchedSnapshot};

/// Replace each item's `viewed_date` with its provenance timestamp and record it
///
/// The server's own "last viewed" is used when it reported one, otherwise `now`, which
/// is the same instant for every server in a cycle. If the cache still holds the same
/// status for the item, the earlier recorded timestamp is kept instead, so an unchanged
/// status does not look newer on every poll.
pub fn stamp_snapshot(cache: &mut ViewedDateCache, snapshot: &mut WatchedSnapshot, now: DateTime<Utc>) {
    let mut kept = 0usize;
    let mut changed = 0usize;

    snapshot.for_each_item_mut(|user_key, item| {
        let status = &mut item.status;
        let cached = cache.get(&item.source.server, user_key, &item.source.item_id);
        let resolved = ViewedDateCache::resolve_viewed_date_at(
            status.reported_viewed_at,
            status.completed,
            status.time,
            cached,
            now,
        );

        let unchanged = cached.map(|entry| entry.matches(status.completed, status.time)).unwrap_or(false);
        if unchanged {
            kept += 1;
        } else {
            changed += 1;
        }

        status.viewed_date = resolved;
        status.last_updated_at = now;
        cache.set_at(
            &item.source.server,
            user_key,
            &item.source.item_id,
            status.completed,
            status.time,
            resolved,
            now,
        );
    });

    debug!(
        "stamp_snapshot: server={}, unchanged={}, changed_or_new={}",
        snapshot.server, kept, changed
    );
}

/// Record the status a target should read after `action` was applied
///
/// The authoritative `viewed_date` is carried over, so on the next poll the target's
/// status matches the cache and keeps that timestamp rather than the write time.
pub fn record_applied(cache: &mut ViewedDateCache, action: &SyncAction, now: DateTime<Utc>) {
    let (completed, time) = match action.kind {
        ActionKind::MarkWatched => (true, 0),
        ActionKind::MarkUnwatched => (false, 0),
        ActionKind::SetPlaybackPosition { seconds } => (false, seconds * 1000),
    };

    cache.set_at(
        &action.target.server,
        &action.user_key,
        &action.target.item_id,
        completed,
        time,
        action.authoritative.viewed_date,
        now,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use watched_sync_models::{LibraryData, MediaIdentifiers, MediaItem, SourceRef, UserData, WatchedStatus};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    fn snapshot_with(status: WatchedStatus) -> WatchedSnapshot {
        let mut library = LibraryData::new("Movies");
        library.movies.push(MediaItem {
            identifiers: MediaIdentifiers::new().with_imdb("tt1"),
            status,
            source: SourceRef::new("den", "uid-1", "m1"),
        });
        let mut user = UserData::default();
        user.libraries.insert("Movies".to_string(), library);
        let mut snapshot = WatchedSnapshot::new("den");
        snapshot.users.insert("alice".to_string(), user);
        snapshot
    }

    fn first_status(snapshot: &WatchedSnapshot) -> WatchedStatus {
        snapshot.users["alice"].libraries["Movies"].movies[0].status.clone()
    }

    #[test]
    fn test_unchanged_status_keeps_first_seen_date() {
        let mut cache = ViewedDateCache::new(30);

        // server has no "last viewed": falls back to fetch time
        let mut first = snapshot_with(WatchedStatus::observed(false, 600_000, None, at(8)));
        stamp_snapshot(&mut cache, &mut first, at(8));
        assert_eq!(first_status(&first).viewed_date, at(8));

        let mut second = snapshot_with(WatchedStatus::observed(false, 600_000, None, at(9)));
        stamp_snapshot(&mut cache, &mut second, at(9));
        let status = first_status(&second);
        assert_eq!(status.viewed_date, at(8));
        assert_eq!(status.last_updated_at, at(9));

        let mut third = snapshot_with(WatchedStatus::observed(false, 900_000, None, at(10)));
        stamp_snapshot(&mut cache, &mut third, at(10));
        assert_eq!(first_status(&third).viewed_date, at(10));

        let entry = cache.get("den", "alice", "m1").unwrap();
        assert_eq!(entry.time, Some(900_000));
        assert_eq!(entry.updated_at, at(10));
    }

    #[test]
    fn test_record_applied_carries_authoritative_date() {
        let mut cache = ViewedDateCache::new(30);
        let action = SyncAction {
            kind: ActionKind::SetPlaybackPosition { seconds: 75 },
            target: SourceRef::new("attic", "uid-9", "x9"),
            user_key: "Alice".to_string(),
            title: "Heat".to_string(),
            authoritative: WatchedStatus::observed(false, 75_400, Some(at(7)), at(8)),
        };

        record_applied(&mut cache, &action, at(8) + Duration::minutes(1));
        let entry = cache.get("attic", "alice", "x9").unwrap();
        assert!(!entry.completed);
        assert_eq!(entry.time, Some(75_000));
        assert_eq!(entry.source_viewed_at, at(7));
    }

    #[test]
    fn test_missing_server_date_uses_stamping_instant() {
        let mut cache = ViewedDateCache::new(30);

        let mut undated = snapshot_with(WatchedStatus::observed(true, 0, None, at(3)));
        stamp_snapshot(&mut cache, &mut undated, at(8));
        assert_eq!(first_status(&undated).viewed_date, at(8));

        let mut cache = ViewedDateCache::new(30);
        let mut dated = snapshot_with(WatchedStatus::observed(true, 0, Some(at(5)), at(3)));
        stamp_snapshot(&mut cache, &mut dated, at(8));
        assert_eq!(first_status(&dated).viewed_date, at(5));
    }
}
