#![cfg(feature = "database")]

//! SQLite command store integration tests

use anilib_core::database::{Database, SqliteCommandStore};
use anilib_core::handlers::{DownloadImage, GetAnimeHttp, GetReleaseGroup, HashFile};
use anilib_core::protocol::Axis;
use anilib_core::queue::{CommandPayload, CommandStore, QueueName};
use anilib_test_utils::group_command;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::task::JoinSet;

async fn create_store() -> (SqliteCommandStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(&temp_dir.path().join("queue.db")).await.unwrap();
    (SqliteCommandStore::new(db), temp_dir)
}

#[tokio::test]
async fn test_concurrent_try_insert_keeps_one_row() {
    let (store, _dir) = create_store().await;
    let store = Arc::new(store);

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let store = store.clone();
        tasks.spawn(async move { store.try_insert(group_command(7, 5)).await.unwrap() });
    }

    let mut inserted = 0;
    while let Some(result) = tasks.join_next().await {
        if result.unwrap() {
            inserted += 1;
        }
    }

    assert_eq!(inserted, 1);
    assert_eq!(store.count(None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_next_pending_orders_by_priority_then_insertion() {
    let (store, _dir) = create_store().await;
    for (gid, priority) in [(1, 9), (2, 3), (3, 7), (4, 3)] {
        store.try_insert(group_command(gid, priority)).await.unwrap();
    }

    let mut order = Vec::new();
    while let Some(command) = store.next_pending(QueueName::General, &[]).await.unwrap() {
        order.push(command.identity.clone());
        assert!(store.delete(&command.identity).await.unwrap());
    }

    assert_eq!(
        order,
        vec![
            "GetReleaseGroup_2",
            "GetReleaseGroup_4",
            "GetReleaseGroup_3",
            "GetReleaseGroup_1",
        ]
    );
}

#[tokio::test]
async fn test_commands_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("queue.db");

    {
        let store = SqliteCommandStore::new(Database::new(&path).await.unwrap());
        let command = HashFile::new("/library/show/01.mkv").into_command().unwrap();
        store.try_insert(command).await.unwrap();
        store.database().close().await;
    }

    let store = SqliteCommandStore::new(Database::new(&path).await.unwrap());
    let pending = store.next_pending(QueueName::Hasher, &[]).await.unwrap().unwrap();
    assert_eq!(pending.identity, "HashFile_/library/show/01.mkv");

    let payload: HashFile = pending.payload().unwrap();
    assert_eq!(payload.path.to_str(), Some("/library/show/01.mkv"));
    assert!(!payload.add_to_mylist);
}

#[tokio::test]
async fn test_blocked_axis_is_skipped() {
    let (store, _dir) = create_store().await;
    store
        .try_insert(GetReleaseGroup { gid: 1 }.into_command().unwrap().with_priority(1))
        .await
        .unwrap();
    store
        .try_insert(GetAnimeHttp { aid: 5 }.into_command().unwrap())
        .await
        .unwrap();

    let next = store
        .next_pending(QueueName::General, &[Axis::Udp])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next.identity, "GetAnimeHttp_5");

    let none = store
        .next_pending(QueueName::General, &[Axis::Udp, Axis::Http])
        .await
        .unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn test_unknown_rows_never_block_the_queue() {
    let (store, _dir) = create_store().await;
    sqlx::query(
        "INSERT INTO command_requests \
         (command_id, command_type, priority, queue, payload, payload_version, created_at, updated_at) \
         VALUES ('Legacy_1', 'LegacyType', 0, 'general', '{}', 1, 0, 0)",
    )
    .execute(store.database().pool())
    .await
    .unwrap();
    store.try_insert(group_command(2, 5)).await.unwrap();

    let next = store.next_pending(QueueName::General, &[]).await.unwrap().unwrap();
    assert_eq!(next.identity, "GetReleaseGroup_2");
    assert!(store.contains("Legacy_1").await.unwrap());
}

#[tokio::test]
async fn test_clear_and_list_are_per_queue() {
    let (store, _dir) = create_store().await;
    store.try_insert(group_command(1, 5)).await.unwrap();
    store.try_insert(group_command(2, 5)).await.unwrap();
    store
        .try_insert(DownloadImage::new("http://img/1.jpg", "/covers/1.jpg").into_command().unwrap())
        .await
        .unwrap();

    assert_eq!(store.list(Some(QueueName::General)).await.unwrap().len(), 2);
    assert_eq!(store.count(Some(QueueName::Images)).await.unwrap(), 1);

    assert_eq!(store.clear(QueueName::General).await.unwrap(), 2);
    assert_eq!(store.count(None).await.unwrap(), 1);
    assert!(!store.delete("GetReleaseGroup_1").await.unwrap());
}
