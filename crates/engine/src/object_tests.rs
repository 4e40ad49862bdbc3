// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use kt_adapters::{FakeIndexSink, SinkCall};
use kt_core::{FakeClock, SequentialIdGen};
use kt_storage::MemoryStore;
use serde_json::json;

type TestObject = StoreObject<MemoryStore, SequentialIdGen>;

fn activation(name: Option<&str>) -> Activation {
    Activation {
        id: StoreId::new("abc"),
        kind: "room".to_string(),
        name: name.map(str::to_string),
    }
}

async fn activate(store: &MemoryStore, sink: &FakeIndexSink, name: Option<&str>) -> TestObject {
    StoreObject::activate(
        store.clone(),
        activation(name),
        sink.clone(),
        SequentialIdGen::new("log"),
        &ReplicationConfig::default(),
        &FakeClock::new(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn first_activation_announces_without_cursor() {
    let store = MemoryStore::new();
    let sink = FakeIndexSink::new();
    let object = activate(&store, &sink, Some("lobby")).await;

    assert_eq!(object.meta().logical_name.as_deref(), Some("lobby"));
    assert_eq!(object.meta().store_kind, "room");
    assert!(store.snapshot().get(META_KEY).is_some(), "meta persisted");
    assert!(matches!(
        sink.calls().as_slice(),
        [SinkCall::Started { cursor: None, .. }]
    ));
}

#[tokio::test]
async fn reactivation_announces_durable_cursor() {
    let store = MemoryStore::new();
    let sink = FakeIndexSink::new();
    {
        let object = activate(&store, &sink, Some("lobby")).await;
        object.put("a", json!(1)).await.unwrap();
        object.put("b", json!(2)).await.unwrap();
    }

    let sink = FakeIndexSink::new();
    let object = activate(&store, &sink, None).await;
    assert_eq!(
        sink.calls().first(),
        Some(&SinkCall::Started {
            meta: object.meta().clone(),
            cursor: Some(WriteCursor::new("log-1", 2)),
        })
    );
}

#[tokio::test]
async fn raw_id_activation_recovers_stored_name() {
    let store = MemoryStore::new();
    let sink = FakeIndexSink::new();
    let started_at = activate(&store, &sink, Some("lobby")).await.meta().started_at;

    let object = activate(&store, &sink, None).await;
    assert_eq!(object.meta().logical_name.as_deref(), Some("lobby"));
    assert_eq!(object.meta().started_at, started_at);
}

#[tokio::test]
async fn later_named_activation_fills_in_name() {
    let store = MemoryStore::new();
    let sink = FakeIndexSink::new();
    activate(&store, &sink, None).await;

    let object = activate(&store, &sink, Some("lobby")).await;
    assert_eq!(object.meta().logical_name.as_deref(), Some("lobby"));
    let stored: ObjectMeta =
        serde_json::from_value(store.snapshot().get(META_KEY).cloned().unwrap()).unwrap();
    assert_eq!(stored.logical_name.as_deref(), Some("lobby"));
}

#[tokio::test]
async fn failed_start_announcement_fails_activation() {
    let sink = FakeIndexSink::new();
    sink.fail_deliveries(true);

    let result = StoreObject::activate(
        MemoryStore::new(),
        activation(None),
        sink,
        SequentialIdGen::new("log"),
        &ReplicationConfig::default(),
        &FakeClock::new(),
    )
    .await;
    assert!(matches!(result, Err(EngineError::Started(_))));
}

#[tokio::test]
async fn list_hides_reserved_keys() {
    let store = MemoryStore::new();
    let object = activate(&store, &FakeIndexSink::new(), None).await;
    object.put("a", json!(1)).await.unwrap();

    let listed = object.list(&ListOptions::new()).await.unwrap();
    assert_eq!(listed, BTreeMap::from([("a".to_string(), json!(1))]));
}

#[tokio::test]
async fn erase_keeps_identity_and_moves_branch() {
    let store = MemoryStore::new();
    let object = activate(&store, &FakeIndexSink::new(), Some("lobby")).await;
    object.put("a", json!(1)).await.unwrap();

    let cursor = object.erase_all().await.unwrap();
    assert_ne!(cursor.log_id, "log-1");
    assert_eq!(object.get("a").await.unwrap(), None);
    assert!(store.snapshot().get(META_KEY).is_some(), "meta re-persisted");
    assert_eq!(object.cursor().await.unwrap(), Some(cursor));
}

#[tokio::test]
async fn reserved_keys_are_refused_and_changes_stay_readable() {
    use kt_core::keys::NEXT_WRITE_KEY;
    use kt_core::ErrorClass;

    let store = MemoryStore::new();
    let object = activate(&store, &FakeIndexSink::new(), None).await;
    let first = object.put("a", json!(1)).await.unwrap().unwrap();
    object.put("b", json!(2)).await.unwrap();

    let forged = json!({"write_id": 2, "keys": [META_KEY]});
    let refused = [
        object.put("_kt.write_id.2", forged).await.unwrap_err(),
        object.delete(NEXT_WRITE_KEY).await.unwrap_err(),
        object.get(META_KEY).await.unwrap_err(),
    ];
    for err in refused {
        assert!(matches!(err, EngineError::ReservedKey { .. }), "{:?}", err);
        assert_eq!(err.class(), ErrorClass::ProtocolViolation);
    }

    let (tx, mut rx) = mpsc::channel(16);
    let read_type = object
        .read_all_from(&SyncRequest::since(&first), &tx)
        .await
        .unwrap();
    drop(tx);
    assert_eq!(read_type, ReadType::ChangesOnly);
    let mut changed = BTreeMap::new();
    while let Some(message) = rx.recv().await {
        if let SyncMessage::KeysAndValues { keys_and_values } = message {
            changed.extend(keys_and_values);
        }
    }
    assert_eq!(changed, BTreeMap::from([("b".to_string(), json!(2))]));
}

#[tokio::test]
async fn learned_name_is_persisted_and_announced() {
    let store = MemoryStore::new();
    let sink = FakeIndexSink::new();
    let object = activate(&store, &sink, None).await;
    let cursor = object.put("a", json!(1)).await.unwrap();

    object.learn_name("lobby", &sink).await.unwrap();
    object.learn_name("other", &sink).await.unwrap();

    assert_eq!(object.meta().logical_name.as_deref(), Some("lobby"));
    let stored: ObjectMeta =
        serde_json::from_value(store.snapshot().get(META_KEY).cloned().unwrap()).unwrap();
    assert_eq!(stored.logical_name.as_deref(), Some("lobby"));
    let started: Vec<_> = sink
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            SinkCall::Started { meta, cursor } => Some((meta.logical_name, cursor)),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![(None, None), (Some("lobby".to_string()), cursor)]);
}
