use super::*;
use chrono::{DateTime, TimeZone, Utc};
use watched_sync_models::{ActionKind, MediaIdentifiers, MediaItem, SourceRef, WatchedStatus};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 4, 18, 30, 0).unwrap()
}

fn watched() -> WatchedStatus {
    WatchedStatus::observed(true, 0, None, now())
}

fn in_progress(time: u64) -> WatchedStatus {
    WatchedStatus::observed(false, time, None, now())
}

fn episode(server: &str, file: &str, status: WatchedStatus) -> MediaItem {
    MediaItem {
        identifiers: MediaIdentifiers::new().with_title(file).with_location(file),
        status,
        source: SourceRef::new(server, "uid", format!("{}-{}", server, file)),
    }
}

fn movie(server: &str, imdb: &str, status: WatchedStatus) -> MediaItem {
    MediaItem {
        identifiers: MediaIdentifiers::new().with_title(imdb).with_imdb(imdb),
        status,
        source: SourceRef::new(server, "uid", format!("{}-{}", server, imdb)),
    }
}

fn show(tvdb: &str, episodes: Vec<MediaItem>) -> Series {
    Series {
        identifiers: MediaIdentifiers::new().with_title(tvdb).with_tvdb(tvdb),
        episodes,
    }
}

fn snapshot(server: &str, users: Vec<(&str, Vec<LibraryData>)>) -> WatchedSnapshot {
    let mut snapshot = WatchedSnapshot::new(server);
    for (user, libraries) in users {
        let mut data = UserData::default();
        for library in libraries {
            data.libraries.insert(library.title.clone(), library);
        }
        snapshot.users.insert(user.to_string(), data);
    }
    snapshot
}

fn tv(series: Vec<Series>) -> LibraryData {
    let mut library = LibraryData::new("TV Shows");
    library.series = series;
    library
}

fn films(movies: Vec<MediaItem>) -> LibraryData {
    let mut library = LibraryData::new("Movies");
    library.movies = movies;
    library
}

fn criminal_minds(server: &str, files: &[&str]) -> Series {
    show(
        "75710",
        files.iter().map(|file| episode(server, file, watched())).collect(),
    )
}

#[test]
fn test_cleanup_keeps_only_unshared_episode() {
    let list_1 = snapshot(
        "one",
        vec![("alice", vec![tv(vec![criminal_minds("one", &["S01E01.mkv", "S01E02.mkv"])])])],
    );
    let list_2 = snapshot(
        "two",
        vec![("alice", vec![tv(vec![criminal_minds("two", &["S01E02.mkv", "S01E03.mkv"])])])],
    );

    let filtered = cleanup(&list_1, &list_2, &NameMapping::default());

    let series = &filtered.users["alice"].libraries["TV Shows"].series;
    assert_eq!(series.len(), 1);
    let episodes: Vec<&str> = series[0]
        .episodes
        .iter()
        .map(|e| e.identifiers.locations[0].as_str())
        .collect();
    assert_eq!(episodes, vec!["S01E01.mkv"]);

    // input untouched
    assert_eq!(list_1.item_count(), 2);
}

#[test]
fn test_cleanup_is_idempotent() {
    let list_1 = snapshot(
        "one",
        vec![
            (
                "alice",
                vec![
                    tv(vec![criminal_minds("one", &["S01E01.mkv", "S01E02.mkv"])]),
                    films(vec![
                        movie("one", "tt1", watched()),
                        movie("one", "tt2", in_progress(600_000)),
                        movie("one", "tt3", in_progress(60_000)),
                    ]),
                ],
            ),
            ("bob", vec![films(vec![movie("one", "tt1", watched())])]),
        ],
    );
    let list_2 = snapshot(
        "two",
        vec![(
            "alice",
            vec![
                tv(vec![criminal_minds("two", &["S01E02.mkv"])]),
                films(vec![movie("two", "tt2", in_progress(120_000)), movie("two", "tt3", in_progress(60_000))]),
            ],
        )],
    );

    let mapping = NameMapping::default();
    let once = cleanup(&list_1, &list_2, &mapping);
    let twice = cleanup(&once, &list_2, &mapping);
    assert_eq!(once, twice);

    // tt2 is further along than its counterpart, tt3 is level with it
    let movies: Vec<&str> = once.users["alice"].libraries["Movies"]
        .movies
        .iter()
        .map(|m| m.identifiers.imdb_id.as_deref().unwrap_or(""))
        .collect();
    assert_eq!(movies, vec!["tt1", "tt2"]);
    // bob has no counterpart user and is kept as-is
    assert_eq!(once.users["bob"].item_count(), 1);
}

#[test]
fn test_cleanup_prunes_empty_containers() {
    let list_1 = snapshot(
        "one",
        vec![
            ("alice", vec![tv(vec![criminal_minds("one", &["S01E02.mkv"])]), films(vec![movie("one", "tt1", watched())])]),
            ("carol", vec![films(vec![movie("one", "tt9", in_progress(90_000))])]),
        ],
    );
    let list_2 = snapshot(
        "two",
        vec![
            ("alice", vec![tv(vec![criminal_minds("two", &["S01E02.mkv"])]), films(vec![movie("two", "tt1", watched())])]),
            ("carol", vec![films(vec![movie("two", "tt9", watched())])]),
        ],
    );

    let filtered = cleanup(&list_1, &list_2, &NameMapping::default());
    assert!(filtered.is_empty());
    assert_eq!(filtered.server, "one");
}

#[test]
fn test_cleanup_prunes_show_but_keeps_library_with_movies() {
    let list_1 = snapshot(
        "one",
        vec![(
            "alice",
            vec![tv(vec![
                criminal_minds("one", &["S01E02.mkv"]),
                show("81189", vec![episode("one", "Pilot.mkv", watched())]),
            ])],
        )],
    );
    let list_2 = snapshot("two", vec![("alice", vec![tv(vec![criminal_minds("two", &["S01E02.mkv"])])])]);

    let filtered = cleanup(&list_1, &list_2, &NameMapping::default());
    let series = &filtered.users["alice"].libraries["TV Shows"].series;
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].identifiers.tvdb_id.as_deref(), Some("81189"));
}

#[test]
fn test_push_actions_target_counterparts() {
    let list_1 = snapshot(
        "one",
        vec![(
            "alice",
            vec![films(vec![
                movie("one", "tt1", watched()),
                movie("one", "tt2", in_progress(600_500)),
                movie("one", "tt4", watched()),
            ])],
        )],
    );
    let list_2 = snapshot(
        "two",
        vec![(
            "Alice",
            vec![films(vec![movie("two", "tt1", in_progress(61_000)), movie("two", "tt2", in_progress(120_000))])],
        )],
    );

    let mapping = NameMapping::default();
    let filtered = cleanup(&list_1, &list_2, &mapping);
    let actions = push_actions(&filtered, &list_2, &mapping);

    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0].kind, ActionKind::MarkWatched);
    assert_eq!(actions[0].target.item_id, "two-tt1");
    assert_eq!(actions[0].user_key, "Alice");
    assert_eq!(actions[1].kind, ActionKind::SetPlaybackPosition { seconds: 600 });
    assert_eq!(actions[1].target.item_id, "two-tt2");
}
