//! Integration tests for the SQLite-backed progress record store.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use task_progress_core::{
    InMemoryStatusChannel, NewProgressRecord, PersistentChannelReporter, Principal,
    ProgressPersistence, ProgressReporter, RecordState, StatusChannel, TaskError, TaskId,
    TaskState,
};
use task_progress_db::Database;

#[tokio::test]
async fn test_create_through_trait() {
    let db = Database::new_in_memory().await.unwrap();
    let store: &dyn ProgressPersistence = &db;
    let id = TaskId::new();

    let record = store
        .create(NewProgressRecord::new(id, Principal::new("alice")))
        .await
        .unwrap();

    assert!(record.id > 0);
    assert_eq!(record.task_id, id);
    assert!(!record.completed);
    assert_eq!(record.state, RecordState::Pending);
    assert_eq!(record.user.as_str(), "alice");
    assert_eq!(db.count_progress_records().await.unwrap(), 1);
}

#[tokio::test]
async fn test_one_record_per_attempt() {
    let db = Database::new_in_memory().await.unwrap();
    let id = TaskId::new();

    for _ in 0..3 {
        db.insert_progress_record(&NewProgressRecord::new(id, Principal::new("alice")))
            .await
            .unwrap();
    }

    let records = db.get_progress_records(&id).await.unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.windows(2).all(|w| w[0].id < w[1].id));

    let other = db.get_progress_records(&TaskId::new()).await.unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn test_list_for_user_newest_first() {
    let db = Database::new_in_memory().await.unwrap();
    let alice = Principal::new("alice");
    let bob = Principal::new("bob");

    let mut alice_ids = Vec::new();
    for _ in 0..4 {
        let id = TaskId::new();
        db.insert_progress_record(&NewProgressRecord::new(id, alice.clone()))
            .await
            .unwrap();
        alice_ids.push(id);
    }
    db.insert_progress_record(&NewProgressRecord::new(TaskId::new(), bob.clone()))
        .await
        .unwrap();

    let listed = db.list_progress_records_for_user(&alice, 3).await.unwrap();
    assert_eq!(listed.len(), 3);
    assert_eq!(listed[0].task_id, alice_ids[3]);
    assert!(listed.iter().all(|r| r.user == alice));

    let bobs = db.list_progress_records_for_user(&bob, 10).await.unwrap();
    assert_eq!(bobs.len(), 1);
}

#[tokio::test]
async fn test_persistent_reporter_writes_record_once() {
    let db = Database::new_in_memory().await.unwrap();
    let channel = Arc::new(InMemoryStatusChannel::new());
    let id = TaskId::new();

    let reporter =
        PersistentChannelReporter::create(id, channel.clone(), &db, Principal::new("carol"))
            .await
            .unwrap();
    reporter.set_progress(1, 3, "one").await.unwrap();
    reporter.set_progress(2, 3, "two").await.unwrap();
    reporter
        .stop_task(2, 3, &TaskError::new("Timeout", "upstream timed out"))
        .await
        .unwrap();

    let records = db.get_progress_records(&id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(&records[0], reporter.record());
    assert!(!records[0].completed);
    assert_eq!(records[0].state, RecordState::Pending);

    let status = channel.status(&id).await.unwrap();
    assert_eq!(status.state, TaskState::Failure);
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("progress.db");
    let id = TaskId::new();

    {
        let db = Database::new(&path).await.unwrap();
        db.insert_progress_record(&NewProgressRecord::new(id, Principal::new("dave")))
            .await
            .unwrap();
        db.pool().close().await;
    }

    let db = Database::new(&path).await.unwrap();
    let records = db.get_progress_records(&id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user.as_str(), "dave");
}
