//! Engine lifecycle, range and persistence tests.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::oneshot;
use zaindb_core::{
    Completion, Config, ConnectionState, CoreError, EventLevel, IndexSpec, Key, LocalFactory,
    RangeSpec, StorageEngine,
};
use zaindb_testkit::prelude::*;
use zaindb_testkit::scenarios::{item, items_schema, numbered_engine, ITEMS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Item {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    label: String,
    group: String,
}

fn ids(items: &[Item]) -> Vec<i64> {
    items.iter().filter_map(|i| i.id).collect()
}

#[tokio::test]
async fn records_round_trip_with_assigned_ids() {
    let engine = numbered_engine(0).await;
    let records: Vec<Item> = ["a", "b", "c"]
        .iter()
        .map(|label| Item {
            id: None,
            label: (*label).to_string(),
            group: "g".into(),
        })
        .collect();

    let keys = engine.try_add(ITEMS, records.clone()).await.unwrap();
    assert_eq!(keys, vec![Key::from(1), Key::from(2), Key::from(3)]);

    let stored: Vec<Item> = engine.try_read_all(ITEMS).await.unwrap();
    assert_eq!(ids(&stored), vec![1, 2, 3]);
    for (saved, original) in stored.iter().zip(&records) {
        assert_eq!(saved.label, original.label);
        assert_eq!(saved.group, original.group);
    }
}

#[tokio::test]
async fn clear_is_idempotent() {
    let engine = numbered_engine(5).await;
    engine.try_clear(ITEMS).await.unwrap();
    engine.try_clear(ITEMS).await.unwrap();

    let (tx, rx) = oneshot::channel();
    engine.clear_table(ITEMS, move |done| {
        let _ = tx.send(done);
    });
    assert!(rx.await.unwrap().is_complete());

    let stored: Vec<Item> = engine.try_read_all(ITEMS).await.unwrap();
    assert!(stored.is_empty());
}

#[tokio::test]
async fn bound_range_is_half_open() {
    let engine = numbered_engine(10).await;
    let range = RangeSpec::Bound {
        lower: Key::from(3),
        upper: Key::from(7),
        lower_exclusive: false,
        upper_exclusive: true,
    };
    let found: Vec<Item> = engine
        .try_search_range(ITEMS, "id", Some(range))
        .await
        .unwrap();
    assert_eq!(ids(&found), vec![3, 4, 5, 6]);

    let above: Vec<Item> = engine
        .try_search_range(
            ITEMS,
            "id",
            Some(RangeSpec::LowerBound {
                lower: Key::from(8),
                exclusive: true,
            }),
        )
        .await
        .unwrap();
    assert_eq!(ids(&above), vec![9, 10]);

    let inverted: Vec<Item> = engine
        .try_search_range(
            ITEMS,
            "id",
            Some(RangeSpec::Bound {
                lower: Key::from(7),
                upper: Key::from(3),
                lower_exclusive: false,
                upper_exclusive: false,
            }),
        )
        .await
        .unwrap();
    assert!(inverted.is_empty());
}

#[tokio::test]
async fn composite_index_matches_both_parts() {
    let engine = numbered_engine(6).await;
    let found: Vec<Item> = engine
        .try_search_exact(ITEMS, "group,label", Key::array(["even", "item-4"]))
        .await
        .unwrap();
    assert_eq!(ids(&found), vec![4]);

    let odd: Vec<Item> = engine.try_search_exact(ITEMS, "group", "odd").await.unwrap();
    assert_eq!(ids(&odd), vec![1, 3, 5]);

    // a record sharing only one part must not match
    engine
        .try_add(ITEMS, [item("item-4", "odd"), item("item-9", "even")])
        .await
        .unwrap();
    let only: Vec<Item> = engine
        .try_search_range(
            ITEMS,
            "group,label",
            Some(RangeSpec::Only {
                value: Key::array(["even", "item-4"]),
            }),
        )
        .await
        .unwrap();
    assert_eq!(ids(&only), vec![4]);
}

#[tokio::test]
async fn failed_engine_ignores_operations() {
    let factory = Arc::new(FlakyFactory::always());
    let sink = CollectingSink::new();
    let engine = open_engine(
        factory.clone(),
        "flaky",
        1,
        vec![items_schema()],
        Some(Arc::new(sink.clone())),
    )
    .await;

    assert_eq!(engine.state(), ConnectionState::Failed { retries: 4 });
    assert_eq!(factory.attempts(), 4);
    assert!(sink.contains("giving up after 4 failed opens"));

    let (tx, rx) = oneshot::channel::<Completion>();
    engine.add(ITEMS, [item("x", "y")], move |done| {
        let _ = tx.send(done);
    });
    assert!(rx.await.is_err(), "callback must not run on a failed engine");

    let err = engine.try_add(ITEMS, [item("x", "y")]).await.unwrap_err();
    assert!(err.is_guard());
    assert!(matches!(
        err,
        CoreError::NotOpen {
            state: ConnectionState::Failed { retries: 4 }
        }
    ));

    tokio::task::yield_now().await;
    assert_eq!(factory.attempts(), 4, "a failed engine does not reopen");
}

#[tokio::test]
async fn mutations_before_open_are_ignored() {
    let engine = StorageEngine::builder("early", 1)
        .schema(items_schema())
        .open(Arc::new(LocalFactory::in_memory()));
    assert_eq!(engine.state(), ConnectionState::Opening);

    let existing = Item {
        id: Some(1),
        label: "x".into(),
        group: "y".into(),
    };
    let (add_tx, add_rx) = oneshot::channel::<Completion>();
    engine.add(ITEMS, [item("x", "y")], move |done| {
        let _ = add_tx.send(done);
    });
    let (update_tx, update_rx) = oneshot::channel::<Completion>();
    engine.update(ITEMS, existing.clone(), move |done| {
        let _ = update_tx.send(done);
    });
    let (delete_tx, delete_rx) = oneshot::channel::<Completion>();
    engine.delete_by_key(ITEMS, Key::from(1), move |done| {
        let _ = delete_tx.send(done);
    });
    let (clear_tx, clear_rx) = oneshot::channel::<Completion>();
    engine.clear_table(ITEMS, move |done| {
        let _ = clear_tx.send(done);
    });

    let opening = |err: CoreError| {
        matches!(
            err,
            CoreError::NotOpen {
                state: ConnectionState::Opening
            }
        )
    };
    assert!(opening(engine.try_add(ITEMS, [item("x", "y")]).await.unwrap_err()));
    assert!(opening(engine.try_update(ITEMS, existing).await.unwrap_err()));
    assert!(opening(engine.try_delete(ITEMS, Key::from(1)).await.unwrap_err()));
    assert!(opening(engine.try_clear(ITEMS).await.unwrap_err()));

    assert_eq!(engine.ready().await, ConnectionState::Open);
    assert!(add_rx.await.is_err());
    assert!(update_rx.await.is_err());
    assert!(delete_rx.await.is_err());
    assert!(clear_rx.await.is_err());

    let stored: Vec<Item> = engine.try_read_all(ITEMS).await.unwrap();
    assert!(stored.is_empty());
}

#[tokio::test]
async fn duplicate_index_keeps_its_table() {
    let schema = items_schema().index(IndexSpec::single("label"));
    let engine = open_engine(
        Arc::new(LocalFactory::in_memory()),
        "dup-index",
        1,
        vec![schema],
        None,
    )
    .await;
    assert_eq!(engine.state(), ConnectionState::Open);
    assert_eq!(
        engine.connection().unwrap().index_names(ITEMS).unwrap(),
        vec!["group", "group,label", "id", "label"]
    );

    engine
        .try_add(ITEMS, [item("a", "g"), item("b", "g")])
        .await
        .unwrap();
    let found: Vec<Item> = engine.try_search_exact(ITEMS, "label", "b").await.unwrap();
    assert_eq!(ids(&found), vec![2]);
}

#[tokio::test]
async fn flaky_open_recovers_within_retry_budget() {
    let factory = Arc::new(FlakyFactory::new(3));
    let engine = open_engine(factory.clone(), "flaky", 1, vec![items_schema()], None).await;
    assert_eq!(engine.state(), ConnectionState::Open);
    assert_eq!(factory.attempts(), 4);

    engine.try_add(ITEMS, [item("x", "y")]).await.unwrap();
}

#[tokio::test]
async fn retry_budget_is_configurable() {
    let factory = Arc::new(FlakyFactory::always());
    let engine = StorageEngine::builder("flaky", 1)
        .schema(items_schema())
        .config(Config::default().max_open_retries(0))
        .open(factory.clone());
    assert_eq!(engine.ready().await, ConnectionState::Failed { retries: 1 });
    assert_eq!(factory.attempts(), 1);
}

#[tokio::test]
async fn unsupported_storage_disables_engine() {
    let factory = Arc::new(UnsupportedFactory::new());
    let sink = CollectingSink::new();
    let engine = open_engine(
        factory.clone(),
        "nowhere",
        1,
        vec![items_schema()],
        Some(Arc::new(sink.clone())),
    )
    .await;

    assert_eq!(engine.state(), ConnectionState::Unsupported);
    assert_eq!(factory.opens(), 0);
    assert!(matches!(
        engine.try_read_all::<Item>(ITEMS).await,
        Err(CoreError::NotSupported)
    ));
    assert_eq!(sink.count(EventLevel::Error), 1);
}

#[tokio::test]
async fn journal_replay_restores_records_and_generator() {
    let (factory, dir) = temp_factory();
    {
        let engine = open_engine(factory, "replay", 1, vec![items_schema()], None).await;
        engine
            .try_add(ITEMS, [item("a", "g"), item("b", "g"), item("c", "g")])
            .await
            .unwrap();
        assert_eq!(engine.try_delete(ITEMS, Key::from(3)).await.unwrap(), 1);
    }
    assert!(journal_path(dir.path(), "replay").exists());

    let factory = Arc::new(LocalFactory::in_directory(dir.path()));
    let engine = open_engine(factory, "replay", 1, vec![items_schema()], None).await;
    assert_eq!(engine.state(), ConnectionState::Open);

    let stored: Vec<Item> = engine.try_read_all(ITEMS).await.unwrap();
    assert_eq!(ids(&stored), vec![1, 2]);
    assert_eq!(stored[1].label, "b");

    let keys = engine.try_add(ITEMS, [item("d", "g")]).await.unwrap();
    assert_eq!(keys, vec![Key::from(4)]);

    let found: Vec<Item> = engine.try_search_exact(ITEMS, "label", "d").await.unwrap();
    assert_eq!(ids(&found), vec![4]);
}

#[tokio::test]
async fn downgrade_fails_to_open() {
    let (factory, _dir) = temp_factory();
    let newer = open_engine(factory.clone(), "versioned", 2, vec![items_schema()], None).await;
    assert_eq!(newer.state(), ConnectionState::Open);
    assert_eq!(newer.connection().unwrap().version(), 2);

    let older = open_engine(factory, "versioned", 1, vec![items_schema()], None).await;
    assert!(matches!(older.state(), ConnectionState::Failed { .. }));
}

#[tokio::test]
async fn second_factory_is_locked_out() {
    let (factory, dir) = temp_factory();
    let first = open_engine(factory, "locked", 1, vec![items_schema()], None).await;
    assert_eq!(first.state(), ConnectionState::Open);

    let other = Arc::new(LocalFactory::in_directory(dir.path()));
    let second = open_engine(other, "locked", 1, vec![items_schema()], None).await;
    assert!(matches!(second.state(), ConnectionState::Failed { .. }));
}
