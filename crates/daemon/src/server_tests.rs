// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::lifecycle::{build_context, Config, DaemonConfig};
use kt_core::{IndexMessage, ReadType, SyncMessage, WriteCursor};
use kt_daemon::protocol::Envelope;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const TOKEN: &str = "0123456789abcdef0123456789abcdef01234567";

async fn context(dir: &Path) -> Arc<DaemonContext> {
    let config = Config::from_file(DaemonConfig {
        state_dir: Some(dir.to_path_buf()),
        socket_path: Some(dir.join("ktd.sock")),
        kinds: vec!["room".to_string()],
        replication: ReplicationConfig::default().with_close_grace(Duration::from_millis(50)),
    })
    .unwrap();
    let index = IndexService::open(WalStore::open(&config.index_path).unwrap())
        .await
        .unwrap();
    Arc::new(build_context(&config, index, TOKEN))
}

fn lobby() -> StoreAddress {
    StoreAddress::Name {
        kind: "room".to_string(),
        name: "lobby".to_string(),
    }
}

async fn connect(ctx: &Arc<DaemonContext>, token: &str, request: Request) -> UnixStream {
    let (mut client, server) = UnixStream::pair().unwrap();
    let ctx = Arc::clone(ctx);
    tokio::spawn(async move {
        let _ = handle_connection(ctx, server).await;
    });
    let envelope = Envelope {
        token: token.to_string(),
        request,
    };
    let data = protocol::encode(&envelope).unwrap();
    protocol::write_message(&mut client, &data).await.unwrap();
    client
}

async fn recv(client: &mut UnixStream) -> Response {
    let data = protocol::read_message(client).await.unwrap();
    protocol::decode(&data).unwrap()
}

async fn call(ctx: &Arc<DaemonContext>, request: Request) -> Response {
    let mut client = connect(ctx, TOKEN, request).await;
    recv(&mut client).await
}

async fn put(ctx: &Arc<DaemonContext>, key: &str, value: serde_json::Value) -> WriteCursor {
    let response = call(
        ctx,
        Request::Put {
            store: lobby(),
            entries: BTreeMap::from([(key.to_string(), value)]),
        },
    )
    .await;
    match response {
        Response::Written {
            cursor: Some(cursor),
        } => cursor,
        other => panic!("expected Written, got {:?}", other),
    }
}

/// Read sync frames up to and including `end`
async fn read_sync(client: &mut UnixStream) -> Vec<SyncMessage> {
    let mut messages = Vec::new();
    loop {
        match recv(client).await {
            Response::Sync { message } => {
                let end = message.is_end();
                messages.push(message);
                if end {
                    return messages;
                }
            }
            other => panic!("expected Sync, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn ping_pongs() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path()).await;
    assert_eq!(call(&ctx, Request::Ping).await, Response::Pong);
}

#[tokio::test]
async fn wrong_token_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path()).await;
    let mut client = connect(&ctx, "not-the-token", Request::Ping).await;
    match recv(&mut client).await {
        Response::Error { class, .. } => assert_eq!(class, ErrorClass::ProtocolViolation),
        other => panic!("expected Error, got {:?}", other),
    }
}

#[tokio::test]
async fn put_then_get_returns_values() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path()).await;
    put(&ctx, "a", json!(1)).await;

    let response = call(
        &ctx,
        Request::Get {
            store: lobby(),
            keys: vec!["a".to_string(), "missing".to_string()],
        },
    )
    .await;
    assert_eq!(
        response,
        Response::Values {
            values: BTreeMap::from([("a".to_string(), json!(1))]),
        }
    );
}

#[tokio::test]
async fn unknown_kind_is_a_protocol_violation() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path()).await;
    let response = call(
        &ctx,
        Request::EraseAll {
            store: StoreAddress::Name {
                kind: "nope".to_string(),
                name: "lobby".to_string(),
            },
        },
    )
    .await;
    assert!(matches!(
        response,
        Response::Error {
            class: ErrorClass::ProtocolViolation,
            ..
        }
    ));
}

#[tokio::test]
async fn client_writes_to_reserved_keys_are_refused() {
    use kt_core::keys::{change_record_key, NEXT_WRITE_KEY};

    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path()).await;
    let first = put(&ctx, "a", json!(1)).await;

    let requests = [
        Request::Put {
            store: lobby(),
            entries: BTreeMap::from([(NEXT_WRITE_KEY.to_string(), json!({"write_id": 9}))]),
        },
        Request::Delete {
            store: lobby(),
            keys: vec![change_record_key(first.write_id)],
        },
    ];
    for request in requests {
        match call(&ctx, request).await {
            Response::Error { class, .. } => assert_eq!(class, ErrorClass::ProtocolViolation),
            other => panic!("expected Error, got {:?}", other),
        }
    }

    let next = put(&ctx, "b", json!(2)).await;
    assert_eq!(next, WriteCursor::new(first.log_id, first.write_id + 1));
}

#[tokio::test]
async fn sync_streams_snapshot_then_waits_for_reader_to_close() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path()).await;
    let cursor = put(&ctx, "a", json!("x")).await;

    let mut client = connect(
        &ctx,
        TOKEN,
        Request::ReadAllFrom {
            store: lobby(),
            sync: SyncRequest::from_start(),
        },
    )
    .await;
    let messages = read_sync(&mut client).await;

    assert_eq!(
        messages,
        vec![
            SyncMessage::Start {
                read_type: ReadType::FromStart,
                reason: None,
                cur_write_id: Some(cursor),
            },
            SyncMessage::KeysAndValues {
                keys_and_values: BTreeMap::from([("a".to_string(), json!("x"))]),
            },
            SyncMessage::End,
        ]
    );

    client.shutdown().await.unwrap();
    let err = protocol::read_message(&mut client).await.unwrap_err();
    assert!(matches!(err, ProtocolError::ConnectionClosed));
}

#[tokio::test]
async fn sync_with_half_a_cursor_gets_error_frame() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path()).await;

    let mut client = connect(
        &ctx,
        TOKEN,
        Request::ReadAllFrom {
            store: lobby(),
            sync: SyncRequest {
                from_log_id: Some("log".to_string()),
                from_write_id: None,
            },
        },
    )
    .await;
    match recv(&mut client).await {
        Response::Error { class, .. } => assert_eq!(class, ErrorClass::ProtocolViolation),
        other => panic!("expected Error, got {:?}", other),
    }
}

#[tokio::test]
async fn sync_after_erase_reports_log_id_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path()).await;
    let before = put(&ctx, "a", json!(1)).await;
    assert!(matches!(
        call(&ctx, Request::EraseAll { store: lobby() }).await,
        Response::Erased { .. }
    ));

    let mut client = connect(
        &ctx,
        TOKEN,
        Request::ReadAllFrom {
            store: lobby(),
            sync: SyncRequest::since(&before),
        },
    )
    .await;
    let messages = read_sync(&mut client).await;
    assert!(matches!(
        messages[0],
        SyncMessage::Start {
            read_type: ReadType::NoChanges,
            reason: Some(kt_core::NoChangesReason::LogIdMismatch),
            ..
        }
    ));
}

#[tokio::test]
async fn watch_sends_full_index_then_updates() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path()).await;

    let mut watcher = connect(&ctx, TOKEN, Request::WatchIndex).await;
    match recv(&mut watcher).await {
        Response::Index {
            message: IndexMessage::FullIndex { durable_object_list },
        } => assert!(durable_object_list.is_empty()),
        other => panic!("expected full index, got {:?}", other),
    }

    put(&ctx, "a", json!(1)).await;

    match recv(&mut watcher).await {
        Response::Index {
            message: IndexMessage::PartialIndex { durable_object_list },
        } => {
            assert_eq!(durable_object_list.len(), 1);
            assert_eq!(
                durable_object_list[0].meta.logical_name.as_deref(),
                Some("lobby")
            );
        }
        other => panic!("expected partial index, got {:?}", other),
    }
}

#[tokio::test]
async fn status_counts_active_stores() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path()).await;
    put(&ctx, "a", json!(1)).await;

    match call(&ctx, Request::Status).await {
        Response::Status {
            kinds,
            active_stores,
            index_entries,
            ..
        } => {
            assert_eq!(kinds, vec!["room".to_string()]);
            assert_eq!(active_stores, 1);
            assert_eq!(index_entries, 1);
        }
        other => panic!("expected Status, got {:?}", other),
    }
}

#[tokio::test]
async fn reset_index_clears_listing() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path()).await;
    put(&ctx, "a", json!(1)).await;

    assert_eq!(call(&ctx, Request::ResetIndex).await, Response::Ok);
    assert_eq!(
        call(&ctx, Request::ListIndex).await,
        Response::IndexEntries { entries: vec![] }
    );
}

#[tokio::test]
async fn shutdown_request_wakes_main_loop() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path()).await;

    assert_eq!(call(&ctx, Request::Shutdown).await, Response::ShuttingDown);
    tokio::time::timeout(Duration::from_secs(1), ctx.shutdown_requested())
        .await
        .unwrap();
}
