use super::*;
use crate::fact::parse_timestamp;
use crate::logger::LogLevel;
use crate::store::MemoryStore;
use crate::test_helpers::{FlakyStore, RecordingLogger, StepClock};
use time::macros::datetime;
use tokio::time::{Duration, timeout};

fn fact(id: &str, text: &str, created_at: &str) -> FactRecord {
    FactRecord::new(id, text, created_at)
}

fn registry_on(store: Arc<dyn KeyValueStore>) -> (FavoritesRegistry, Arc<RecordingLogger>) {
    let logger = Arc::new(RecordingLogger::default());
    let clock = StepClock::starting_at(datetime!(2024-05-01 12:00 UTC));
    let registry = FavoritesRegistry::with_clock(store, logger.clone(), clock);
    (registry, logger)
}

fn ids(list: &[FactRecord]) -> Vec<&str> {
    list.iter().map(|f| f.id.as_str()).collect()
}

fn assert_newest_first(list: &[FactRecord]) {
    for pair in list.windows(2) {
        let a = parse_timestamp(&pair[0].created_at).expect("timestamp");
        let b = parse_timestamp(&pair[1].created_at).expect("timestamp");
        assert!(a >= b, "{} should not precede {}", pair[0].created_at, pair[1].created_at);
    }
}

// =============================================================================
// initialization
// =============================================================================

#[test]
fn starts_empty_without_stored_blob() {
    let (registry, logger) = registry_on(Arc::new(MemoryStore::new()));
    assert!(registry.is_empty());
    assert!(logger.entries().is_empty());
}

#[test]
fn empty_string_blob_counts_as_nothing_stored() {
    let store = Arc::new(MemoryStore::new());
    store.insert_raw(FAVORITES_STORAGE_KEY, "");
    let (registry, logger) = registry_on(store.clone());
    assert!(registry.is_empty());
    assert!(logger.entries().is_empty());

    registry.add(&fact("1", "A", ""));
    let mut feed = registry.get_all();
    assert!(feed.latest().is_some());
    store.insert_raw(FAVORITES_STORAGE_KEY, "");
    registry.reload();
    assert_eq!(ids(&registry.snapshot()), ["1"]);
    assert!(feed.try_recv().is_none(), "empty blob must not republish");
    assert!(logger.entries().is_empty());
}

#[test]
fn records_without_created_at_load_and_sort_last() {
    let store = Arc::new(MemoryStore::new());
    store.insert_raw(
        FAVORITES_STORAGE_KEY,
        r#"[{"id":"2","text":"B"},{"id":"1","text":"A","createdAt":"2024-01-01"}]"#,
    );
    let (registry, logger) = registry_on(store);
    let list = registry.snapshot();
    assert_eq!(ids(&list), ["1", "2"]);
    assert_eq!(list[1].created_at, "");
    assert!(logger.entries().is_empty());
}

#[test]
fn adding_an_undated_api_fact_stamps_it() {
    let (registry, _) = registry_on(Arc::new(MemoryStore::new()));
    let raw = r#"{"id":"u1","text":"Undated","source":"djtech.net","source_url":"http://x","language":"en","permalink":"http://y"}"#;
    let undated: FactRecord = serde_json::from_str(raw).expect("decode without createdAt");
    registry.add(&undated);
    assert_eq!(parse_timestamp(&registry.snapshot()[0].created_at), Some(datetime!(2024-05-01 12:00 UTC)));
}

#[test]
fn loads_stored_blob_sorted_newest_first() {
    let store = Arc::new(MemoryStore::new());
    store.insert_raw(
        FAVORITES_STORAGE_KEY,
        r#"[{"id":"1","text":"A","createdAt":"2024-01-01"},{"id":"2","text":"B","createdAt":"2024-01-02"}]"#,
    );
    let (registry, logger) = registry_on(store);
    assert_eq!(ids(&registry.snapshot()), ["2", "1"]);
    assert!(logger.entries().is_empty());
}

#[test]
fn malformed_blob_yields_empty_list_and_one_error() {
    let store = Arc::new(MemoryStore::new());
    store.insert_raw(FAVORITES_STORAGE_KEY, "not-a-json");
    let (registry, logger) = registry_on(store);

    assert!(registry.is_empty());
    let entries = logger.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].level, LogLevel::Error);
    assert_eq!(entries[0].message, "Error parsing stored favorites");
    assert_eq!(entries[0].context.as_deref(), Some("FavoritesService"));
    assert!(entries[0].error.is_some());
}

// =============================================================================
// add / remove / is_favorite
// =============================================================================

#[test]
fn add_stamps_created_at_with_clock() {
    let (registry, _) = registry_on(Arc::new(MemoryStore::new()));
    registry.add(&fact("1", "A", "1999-01-01"));
    let list = registry.snapshot();
    assert_eq!(list.len(), 1);
    assert_eq!(parse_timestamp(&list[0].created_at), Some(datetime!(2024-05-01 12:00 UTC)));
    assert_eq!(list[0].text, "A");
}

#[test]
fn add_is_idempotent_per_id() {
    let store = Arc::new(FlakyStore::default());
    let (registry, _) = registry_on(store.clone());
    let f = fact("1", "A", "2024-01-01");
    registry.add(&f);
    registry.add(&f);
    registry.add(&fact("1", "different text", "2024-02-01"));
    assert_eq!(ids(&registry.snapshot()), ["1"]);
    assert_eq!(registry.snapshot()[0].text, "A");
    assert_eq!(store.write_count(), 1);
}

#[test]
fn add_keeps_source() {
    let (registry, _) = registry_on(Arc::new(MemoryStore::new()));
    registry.add(&fact("1", "A", "2024-01-01").with_source("example.org"));
    assert_eq!(registry.snapshot()[0].source.as_deref(), Some("example.org"));
}

#[test]
fn remove_absent_id_is_a_noop_that_still_writes() {
    let store = Arc::new(FlakyStore::default());
    let (registry, logger) = registry_on(store.clone());
    registry.add(&fact("1", "A", ""));
    registry.remove(&fact("missing", "", ""));
    assert_eq!(ids(&registry.snapshot()), ["1"]);
    assert_eq!(store.write_count(), 2);
    assert!(logger.entries().is_empty());
}

#[test]
fn scenario_add_two_remove_one() {
    let (registry, _) = registry_on(Arc::new(MemoryStore::new()));
    registry.add(&fact("1", "A", "2024-01-01"));
    registry.add(&fact("2", "B", "2024-01-02"));
    assert_eq!(ids(&registry.snapshot()), ["2", "1"]);

    registry.remove(&fact("1", "A", "2024-01-01"));
    assert_eq!(ids(&registry.snapshot()), ["2"]);
    assert!(!registry.is_favorite("1"));
    assert!(registry.is_favorite("2"));
}

#[test]
fn list_stays_sorted_across_mixed_operations() {
    let (registry, _) = registry_on(Arc::new(MemoryStore::new()));
    for i in 0..6 {
        registry.add(&fact(&i.to_string(), "x", "2000-01-01"));
    }
    registry.remove_by_id("2");
    registry.add(&fact("7", "x", ""));
    registry.remove_by_id("0");
    registry.add(&fact("2", "back", ""));

    let list = registry.snapshot();
    assert_newest_first(&list);
    assert_eq!(ids(&list), ["2", "7", "5", "4", "3", "1"]);
}

#[test]
fn ties_keep_insertion_order() {
    struct FrozenClock;
    impl Clock for FrozenClock {
        fn now(&self) -> OffsetDateTime {
            datetime!(2024-01-01 00:00 UTC)
        }
    }
    let registry = FavoritesRegistry::with_clock(
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingLogger::default()),
        Arc::new(FrozenClock),
    );
    registry.add(&fact("a", "", ""));
    registry.add(&fact("b", "", ""));
    registry.add(&fact("c", "", ""));
    assert_eq!(ids(&registry.snapshot()), ["a", "b", "c"]);
}

// =============================================================================
// persistence
// =============================================================================

#[test]
fn writes_sorted_json_array_under_fixed_key() {
    let store = Arc::new(MemoryStore::new());
    let (registry, _) = registry_on(store.clone());
    registry.add(&fact("1", "A", ""));
    registry.add(&fact("2", "B", ""));

    let raw = store.read(FAVORITES_STORAGE_KEY).expect("stored");
    let stored: Vec<FactRecord> = serde_json::from_str(&raw).expect("json array");
    assert_eq!(ids(&stored), ["2", "1"]);
    assert!(raw.contains("\"createdAt\""));
    assert!(!raw.contains("\"source\""));
}

#[test]
fn fresh_registry_reads_back_the_same_records() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let (first, _) = registry_on(store.clone());
    first.add(&fact("1", "A", ""));
    first.add(&fact("2", "B", "").with_source("src"));
    first.add(&fact("3", "C", ""));
    first.remove_by_id("1");

    let second = FavoritesRegistry::new(store, Arc::new(RecordingLogger::default()));
    assert_eq!(&*second.snapshot(), &*first.snapshot());
}

#[test]
fn write_failure_is_logged_and_list_is_not_updated() {
    let store = Arc::new(FlakyStore::default());
    let (registry, logger) = registry_on(store.clone());
    registry.add(&fact("1", "A", ""));
    let mut feed = registry.get_all();
    assert_eq!(feed.latest().map(|l| l.len()), Some(1));

    store.set_failing(true);
    registry.add(&fact("2", "B", ""));
    registry.remove_by_id("1");

    assert_eq!(ids(&registry.snapshot()), ["1"]);
    assert!(!registry.is_favorite("2"));
    assert!(feed.try_recv().is_none(), "failed writes must not publish");

    let entries = logger.entries();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.message == "Error saving favorites"));
    assert!(entries[0].error.as_deref().is_some_and(|e| e.contains("disabled for test")));

    // The stored blob still holds the last successful write.
    let stored: Vec<FactRecord> = serde_json::from_str(&store.read(FAVORITES_STORAGE_KEY).expect("stored")).expect("json");
    assert_eq!(ids(&stored), ["1"]);
}

#[test]
fn quota_exceeded_write_is_swallowed() {
    let store = Arc::new(MemoryStore::with_quota(80));
    let (registry, logger) = registry_on(store);
    registry.add(&fact("1", "short", ""));
    registry.add(&fact("2", "this one will not fit into the tiny quota at all", ""));
    assert_eq!(ids(&registry.snapshot()), ["1"]);
    assert_eq!(logger.entries().len(), 1);
}

#[test]
fn reload_picks_up_external_changes_and_publishes() {
    let store = Arc::new(MemoryStore::new());
    let (registry, logger) = registry_on(store.clone());
    let mut feed = registry.get_all();
    assert!(feed.latest().is_some());

    store.insert_raw(FAVORITES_STORAGE_KEY, r#"[{"id":"9","text":"Z","createdAt":"2024-01-01"}]"#);
    registry.reload();
    assert_eq!(ids(&feed.try_recv().expect("published")), ["9"]);

    store.insert_raw(FAVORITES_STORAGE_KEY, "{broken");
    registry.reload();
    assert!(feed.try_recv().expect("published").is_empty());
    assert_eq!(logger.entries().len(), 1);
}

#[test]
fn reload_without_blob_keeps_current_list() {
    let store = Arc::new(MemoryStore::new());
    let (registry, _) = registry_on(store.clone());
    registry.add(&fact("1", "A", ""));
    store.clear().expect("clear");
    registry.reload();
    assert_eq!(ids(&registry.snapshot()), ["1"]);
}

// =============================================================================
// feeds
// =============================================================================

#[test]
fn new_feed_replays_current_list_first() {
    let (registry, _) = registry_on(Arc::new(MemoryStore::new()));
    registry.add(&fact("1", "A", ""));
    let mut feed = registry.get_all();
    assert_eq!(ids(&feed.try_recv().expect("replay")), ["1"]);
    assert!(feed.try_recv().is_none());
}

#[test]
fn every_feed_sees_every_mutation_in_order() {
    let (registry, _) = registry_on(Arc::new(MemoryStore::new()));
    let mut a = registry.get_all();
    let mut b = registry.get_all();

    registry.add(&fact("1", "A", ""));
    registry.add(&fact("2", "B", ""));
    registry.remove_by_id("1");

    for feed in [&mut a, &mut b] {
        let mut seen = Vec::new();
        while let Some(list) = feed.try_recv() {
            seen.push(ids(&list).join(","));
        }
        assert_eq!(seen, ["", "1", "2,1", "2"]);
    }
}

#[test]
fn dropped_feeds_are_pruned() {
    let (registry, _) = registry_on(Arc::new(MemoryStore::new()));
    let feed = registry.get_all();
    let mut kept = registry.get_all();
    drop(feed);
    registry.add(&fact("1", "A", ""));
    assert_eq!(registry.lock().feeds.len(), 1);
    assert_eq!(kept.latest().map(|l| l.len()), Some(1));
}

#[tokio::test]
async fn feed_recv_waits_for_next_mutation() {
    let registry = Arc::new(registry_on(Arc::new(MemoryStore::new())).0);
    let mut feed = registry.get_all();
    assert!(feed.recv().await.expect("replay").is_empty());

    let writer = registry.clone();
    tokio::spawn(async move {
        writer.add(&fact("1", "A", ""));
    });

    let next = timeout(Duration::from_millis(500), feed.recv())
        .await
        .expect("feed receive timed out")
        .expect("feed closed");
    assert_eq!(ids(&next), ["1"]);
}

#[tokio::test]
async fn feed_ends_when_registry_is_dropped() {
    let (registry, _) = registry_on(Arc::new(MemoryStore::new()));
    let mut feed = registry.get_all();
    drop(registry);
    assert!(feed.recv().await.is_some(), "replayed list is still buffered");
    assert!(feed.recv().await.is_none());
}
