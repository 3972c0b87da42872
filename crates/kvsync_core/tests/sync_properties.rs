//! Relay and echo-suppression behavior of synced cells.

use kvsync_core::{
    create_synced, RelayState, RemoteSubscription, Subscription, SyncConfig, SyncedCell,
};
use kvsync_store::{MemoryKv, StorageArea};
use kvsync_testkit::{init_tracing, items, settle, ScriptedKv};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn theme(kv: &ScriptedKv, load_from_storage: bool) -> SyncedCell<String> {
    create_synced(kv.shared(), "theme", "light".to_string(), load_from_storage).unwrap()
}

/// Records values the cell notifies after this call.
fn notifications(cell: &SyncedCell<String>) -> (Arc<Mutex<Vec<String>>>, Subscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = cell.subscribe(move |v: &String| sink.lock().push(v.clone()));
    seen.lock().clear();
    (seen, subscription)
}

#[tokio::test]
async fn theme_scenario() {
    init_tracing();
    let kv = ScriptedKv::new();
    let cell = theme(&kv, true);

    cell.settled().await;
    assert_eq!(cell.get(), "light");
    // The starting value is written back once, seeding the key
    assert_eq!(kv.writes_of("theme"), vec![json!("light")]);

    cell.set("dark".to_string());
    cell.settled().await;
    let dark_writes = kv
        .writes_of("theme")
        .into_iter()
        .filter(|v| *v == json!("dark"))
        .count();
    assert_eq!(dark_writes, 1);
    assert_eq!(kv.write_count(), 2);

    kv.external_set("theme", json!("blue"));
    assert_eq!(cell.get(), "blue");

    settle().await;
    assert_eq!(kv.write_count(), 2);
    assert_eq!(cell.status().relay, RelayState::Idle);
}

#[tokio::test]
async fn stored_value_wins_over_initial() {
    let kv = ScriptedKv::with_items(items(&[("theme", json!("dark"))]));
    let cell = theme(&kv, true);

    assert_eq!(cell.get(), "light");
    cell.loaded().await;
    assert_eq!(cell.get(), "dark");
    assert_eq!(kv.read_count(), 1);
}

#[tokio::test]
async fn missing_value_falls_back_to_initial() {
    let kv = ScriptedKv::new();
    let cell = theme(&kv, true);
    cell.settled().await;

    assert_eq!(cell.get(), "light");
    assert_eq!(kv.value("theme"), Some(json!("light")));
}

#[tokio::test]
async fn undecodable_stored_value_falls_back_to_initial() {
    let kv = ScriptedKv::with_items(items(&[("count", json!({"not": "a number"}))]));
    let cell = create_synced(kv.shared(), "count", 3u32, true).unwrap();
    cell.settled().await;

    assert_eq!(cell.get(), 3);
    assert_eq!(kv.value("count"), Some(json!(3)));
}

#[tokio::test]
async fn without_loading_initial_value_is_pushed() {
    let kv = ScriptedKv::with_items(items(&[("theme", json!("dark"))]));
    let cell = theme(&kv, false);

    assert_eq!(kv.read_count(), 0);
    assert_eq!(cell.status().relay.pending_writes(), 1);
    assert!(cell.status().loaded);

    cell.settled().await;
    assert_eq!(kv.write_count(), 1);
    assert_eq!(cell.get(), "light");
    assert_eq!(kv.value("theme"), Some(json!("light")));
}

#[tokio::test]
async fn local_writes_are_never_deduplicated() {
    let kv = ScriptedKv::new();
    let cell = theme(&kv, true);
    cell.settled().await;
    kv.clear_writes();

    cell.set("light".to_string());
    cell.set("light".to_string());
    cell.settled().await;

    assert_eq!(kv.writes_of("theme"), vec![json!("light"), json!("light")]);
}

#[tokio::test]
async fn own_write_is_not_applied_back() {
    let kv = ScriptedKv::new();
    let cell = theme(&kv, true);
    cell.settled().await;
    let (seen, _sub) = notifications(&cell);

    cell.set("dark".to_string());
    cell.settled().await;

    // Only the local set itself; the store's echo did not re-set the cell
    assert_eq!(*seen.lock(), vec!["dark".to_string()]);
}

#[tokio::test]
async fn remote_change_is_applied_without_write() {
    let kv = ScriptedKv::new();
    let cell = theme(&kv, true);
    cell.settled().await;
    kv.clear_writes();
    let (seen, _sub) = notifications(&cell);

    kv.external_set("theme", json!("blue"));
    kv.external_set("theme", json!("green"));
    settle().await;

    assert_eq!(*seen.lock(), vec!["blue".to_string(), "green".to_string()]);
    assert_eq!(kv.write_count(), 0);
}

#[tokio::test]
async fn remote_change_during_pending_write_is_ignored() {
    let kv = ScriptedKv::new();
    let cell = theme(&kv, true);
    cell.settled().await;

    kv.hold_writes();
    cell.set("dark".to_string());
    settle().await;
    assert_eq!(cell.status().relay, RelayState::ApplyingLocal { pending: 1 });

    kv.external_set("theme", json!("blue"));
    assert_eq!(cell.get(), "dark");

    kv.release_writes();
    cell.settled().await;
    assert_eq!(cell.status().relay, RelayState::Idle);

    kv.external_set("theme", json!("green"));
    assert_eq!(cell.get(), "green");
}

#[tokio::test]
async fn overlapping_local_writes_are_issued_in_order() {
    let kv = ScriptedKv::new();
    let cell = theme(&kv, true);
    cell.settled().await;
    kv.clear_writes();

    kv.hold_writes();
    cell.set("a".to_string());
    cell.set("b".to_string());
    cell.set("c".to_string());
    assert_eq!(cell.status().relay.pending_writes(), 3);

    // The next write waits for the held one
    settle().await;
    assert_eq!(kv.writes_of("theme"), vec![json!("a")]);

    kv.release_writes();
    cell.settled().await;
    assert_eq!(cell.status().relay, RelayState::Idle);
    assert_eq!(
        kv.writes_of("theme"),
        vec![json!("a"), json!("b"), json!("c")]
    );
    assert_eq!(kv.value("theme"), Some(json!("c")));
}

#[tokio::test]
async fn failed_write_releases_the_guard() {
    let kv = ScriptedKv::new();
    let cell = theme(&kv, true);
    cell.settled().await;

    kv.fail_next_set("quota exceeded");
    cell.set("dark".to_string());
    cell.settled().await;

    assert_eq!(cell.status().relay, RelayState::Idle);
    assert_eq!(kv.value("theme"), Some(json!("light")));

    kv.external_set("theme", json!("blue"));
    assert_eq!(cell.get(), "blue");

    cell.set("red".to_string());
    cell.settled().await;
    assert_eq!(kv.value("theme"), Some(json!("red")));
}

#[tokio::test]
async fn timed_out_write_releases_the_guard() {
    let kv = ScriptedKv::new();
    kv.hold_writes();

    let config = SyncConfig::new("theme")
        .with_load_from_storage(false)
        .with_write_timeout(Duration::from_millis(20));
    let cell = SyncedCell::create(kv.shared(), config, "light".to_string()).unwrap();
    assert_eq!(cell.status().relay.pending_writes(), 1);

    cell.settled().await;
    assert_eq!(cell.status().relay, RelayState::Idle);

    kv.external_set("theme", json!("blue"));
    assert_eq!(cell.get(), "blue");
}

#[tokio::test]
async fn remote_change_during_load_beats_the_read() {
    let kv = ScriptedKv::with_items(items(&[("theme", json!("old"))]));
    let cell = theme(&kv, true);

    // Another writer lands after the read was issued but before it resolved
    kv.external_set("theme", json!("newer"));
    cell.settled().await;

    assert_eq!(cell.get(), "newer");
    assert_eq!(kv.value("theme"), Some(json!("newer")));
    assert_eq!(kv.write_count(), 0);

    cell.set("dark".to_string());
    cell.settled().await;
    assert_eq!(kv.value("theme"), Some(json!("dark")));
}

#[tokio::test]
async fn malformed_change_during_load_keeps_the_read() {
    let kv = ScriptedKv::with_items(items(&[("count", json!(4))]));
    let cell = create_synced(kv.shared(), "count", 0u32, true).unwrap();

    kv.external_set("count", json!("four"));
    cell.settled().await;

    assert_eq!(cell.get(), 4);
}

#[tokio::test]
async fn failed_load_keeps_initial_and_skips_priming_write() {
    let kv = ScriptedKv::with_items(items(&[("theme", json!("dark"))]));
    kv.fail_next_get("offline");
    let cell = theme(&kv, true);
    cell.settled().await;

    assert_eq!(cell.get(), "light");
    assert_eq!(kv.write_count(), 0);
    assert_eq!(kv.value("theme"), Some(json!("dark")));

    cell.set("blue".to_string());
    cell.settled().await;
    assert_eq!(kv.value("theme"), Some(json!("blue")));
}

#[tokio::test]
async fn malformed_changes_are_ignored() {
    let kv = ScriptedKv::new();
    let cell = create_synced(kv.shared(), "count", 1u32, true).unwrap();
    cell.settled().await;
    kv.clear_writes();

    kv.external_set("count", json!("seven"));
    assert_eq!(cell.get(), 1);

    kv.external_remove("count");
    assert_eq!(cell.get(), 1);
    assert_eq!(cell.status().relay, RelayState::Idle);

    kv.external_set("count", json!(7));
    assert_eq!(cell.get(), 7);
    settle().await;
    assert_eq!(kv.write_count(), 0);
}

#[tokio::test]
async fn other_keys_and_areas_are_ignored() {
    let kv = ScriptedKv::with_area(StorageArea::Local);
    let cell = theme(&kv, true);
    cell.settled().await;

    kv.external_set("theme", json!("blue"));
    assert_eq!(cell.get(), "light");

    let local = SyncedCell::create(
        kv.shared(),
        SyncConfig::new("accent").with_area(StorageArea::Local),
        "teal".to_string(),
    )
    .unwrap();
    local.settled().await;

    kv.external_set("theme", json!("green"));
    assert_eq!(local.get(), "teal");

    kv.external_set("accent", json!("orange"));
    assert_eq!(local.get(), "orange");
    assert_eq!(cell.get(), "light");
}

#[tokio::test]
async fn lazy_subscription_waits_for_first_write() {
    let kv = ScriptedKv::new();
    kv.fail_next_get("offline");
    let config = SyncConfig::new("theme").with_remote_subscription(RemoteSubscription::Lazy);
    let cell = SyncedCell::create(kv.shared(), config, "light".to_string()).unwrap();
    cell.settled().await;

    // Failed load skipped the priming write, so nothing has been written yet
    assert!(!cell.is_listening());
    kv.external_set("theme", json!("blue"));
    assert_eq!(cell.get(), "light");

    cell.set("dark".to_string());
    cell.settled().await;
    assert!(cell.is_listening());

    kv.external_set("theme", json!("green"));
    assert_eq!(cell.get(), "green");
}

#[tokio::test]
async fn lazy_subscription_starts_after_priming_write() {
    let kv = ScriptedKv::new();
    let config = SyncConfig::new("theme").with_remote_subscription(RemoteSubscription::Lazy);
    let cell = SyncedCell::create(kv.shared(), config, "light".to_string()).unwrap();
    assert!(!cell.is_listening());
    assert_eq!(kv.listener_count(), 0);

    cell.settled().await;
    assert!(cell.is_listening());
    assert_eq!(kv.listener_count(), 1);
}

#[tokio::test]
async fn writers_sharing_a_store_see_each_other() {
    let kv = ScriptedKv::new();
    let first = theme(&kv, true);
    let second = theme(&kv, true);
    first.settled().await;
    second.settled().await;
    kv.clear_writes();

    first.set("dark".to_string());
    first.settled().await;

    assert_eq!(second.get(), "dark");
    assert_eq!(kv.write_count(), 1);
}

#[tokio::test]
async fn disposed_cell_stops_relaying() {
    let kv = ScriptedKv::new();
    let cell = theme(&kv, true);
    cell.settled().await;
    kv.clear_writes();

    cell.dispose();
    assert_eq!(kv.listener_count(), 0);

    kv.external_set("theme", json!("blue"));
    cell.set("dark".to_string());
    settle().await;

    assert_eq!(cell.get(), "dark");
    assert_eq!(kv.write_count(), 0);
    assert_eq!(kv.value("theme"), Some(json!("blue")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cell_may_be_set_from_another_thread() {
    let kv = ScriptedKv::new();
    let cell = theme(&kv, true);
    cell.settled().await;

    let handle = cell.cell().clone();
    tokio::task::spawn_blocking(move || handle.set("dark".to_string()))
        .await
        .unwrap();

    cell.settled().await;
    assert_eq!(kv.value("theme"), Some(json!("dark")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn store_follows_cell_on_multi_thread_runtime() {
    let kv = MemoryKv::new();
    let cell = create_synced(Arc::new(kv.clone()), "n", 0u32, false).unwrap();

    for round in 0..50u32 {
        for i in 0..20 {
            cell.set(round * 100 + i);
        }
        cell.settled().await;
        assert_eq!(kv.items()["n"], json!(cell.get()), "round {round}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn no_echo_on_multi_thread_runtime() {
    let kv = ScriptedKv::new();
    let cell = theme(&kv, true);
    cell.settled().await;
    kv.clear_writes();
    let (seen, _sub) = notifications(&cell);

    let setters: Vec<_> = (0..4)
        .map(|t| {
            let handle = cell.cell().clone();
            tokio::task::spawn_blocking(move || {
                for i in 0..10 {
                    handle.set(format!("t{t}-{i}"));
                }
            })
        })
        .collect();
    for setter in setters {
        setter.await.unwrap();
    }
    cell.settled().await;

    // Every local set written once, none applied back
    assert_eq!(kv.write_count(), 40);
    assert_eq!(seen.lock().len(), 40);
    assert_eq!(kv.value("theme"), Some(json!(cell.get())));

    for word in ["blue", "green", "red"] {
        kv.external_set("theme", json!(word));
        assert_eq!(cell.get(), word);
    }
    settle().await;
    cell.settled().await;
    assert_eq!(kv.write_count(), 40);
    assert_eq!(seen.lock().len(), 43);
}
