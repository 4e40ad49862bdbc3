// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[tokio::test]
async fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("store.wal");

    {
        let store = WalStore::open(&path).unwrap();
        store
            .apply(vec![Mutation::put("a", json!(1)), Mutation::put("b", json!(1))])
            .await
            .unwrap();
        store
            .apply(vec![Mutation::put("a", json!(2)), Mutation::delete("b")])
            .await
            .unwrap();
    }

    let store = WalStore::open(&path).unwrap();
    assert_eq!(store.get("a").await.unwrap(), Some(json!(2)));
    assert_eq!(store.get("b").await.unwrap(), None);
    assert_eq!(store.path(), path.as_path());
}

#[tokio::test]
async fn erase_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.wal");

    {
        let store = WalStore::open(&path).unwrap();
        store.apply(vec![Mutation::put("a", json!(1))]).await.unwrap();
        store.erase_all().await.unwrap();
        store.apply(vec![Mutation::put("z", json!(9))]).await.unwrap();
    }

    let store = WalStore::open(&path).unwrap();
    let all = store.list(&ListOptions::new()).await.unwrap();
    assert_eq!(all, BTreeMap::from([("z".to_string(), json!(9))]));
}

#[tokio::test]
async fn list_pages_are_ordered() {
    let dir = tempfile::tempdir().unwrap();
    let store = WalStore::open(&dir.path().join("store.wal")).unwrap();
    store
        .apply(vec![
            Mutation::put("c", json!(3)),
            Mutation::put("a", json!(1)),
            Mutation::put("b", json!(2)),
        ])
        .await
        .unwrap();

    let page = store
        .list(&ListOptions::new().with_start_after("a").with_limit(1))
        .await
        .unwrap();
    assert_eq!(page, BTreeMap::from([("b".to_string(), json!(2))]));
}
