//! End-to-end progress scenarios: a job reports through a channel reporter and
//! a poller reads the normalized view.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use task_progress_core::{
    ChannelReporter, InMemoryPersistence, InMemoryStatusChannel, PersistentChannelReporter,
    Principal, ProgressQuery, ProgressReporter, ProgressResponse, StatusChannel, TaskError, TaskId,
    TaskState,
};

fn setup() -> (Arc<InMemoryStatusChannel>, ProgressQuery) {
    let channel = Arc::new(InMemoryStatusChannel::new());
    let query = ProgressQuery::new(channel.clone()).with_join_timeout(Duration::from_millis(100));
    (channel, query)
}

async fn info_json(query: &ProgressQuery, id: &TaskId) -> Value {
    serde_json::to_value(query.get_info(id).await.unwrap()).unwrap()
}

#[tokio::test]
async fn test_job_not_yet_picked_up() {
    let (_channel, query) = setup();
    let id = TaskId::new();

    assert_eq!(
        info_json(&query, &id).await,
        json!({
            "complete": false,
            "success": null,
            "progress": {"pending": true, "current": 0, "total": 100, "percent": 0.0},
        })
    );
}

#[tokio::test]
async fn test_full_lifecycle_to_success() {
    let (channel, query) = setup();
    let id = TaskId::new();
    let reporter = ChannelReporter::new(id, channel.clone());

    channel
        .update_state(&id, TaskState::Started, Value::Null)
        .await
        .unwrap();
    assert_eq!(info_json(&query, &id).await["progress"]["pending"], json!(false));

    reporter.set_progress(30, 120, "loading").await.unwrap();
    assert_eq!(
        info_json(&query, &id).await["progress"],
        json!({
            "pending": false,
            "current": 30,
            "total": 120,
            "percent": 25.0,
            "description": "loading",
        })
    );

    channel
        .update_state(&id, TaskState::Success, json!({"rows": 42}))
        .await
        .unwrap();
    assert_eq!(
        info_json(&query, &id).await,
        json!({
            "complete": true,
            "success": true,
            "progress": {"pending": false, "current": 100, "total": 100, "percent": 100.0},
            "result": {"rows": 42},
        })
    );
}

#[tokio::test]
async fn test_job_stopped_on_error() {
    let (channel, query) = setup();
    let store = InMemoryPersistence::new();
    let id = TaskId::new();
    let reporter = PersistentChannelReporter::create(
        id,
        channel.clone(),
        &store,
        Principal::new("user-7"),
    )
    .await
    .unwrap();

    reporter.set_progress(12, 40, "importing").await.unwrap();
    let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
    reporter
        .stop_task(12, 40, &TaskError::from_error(&io))
        .await
        .unwrap();

    let status = channel.status(&id).await.unwrap();
    assert_eq!(status.state, TaskState::Failure);
    assert_eq!(status.info["percent"], json!(100.0));
    assert_eq!(status.info["exc_message"], json!("disk full"));
    assert_eq!(status.info["current"], json!(12));

    let info = info_json(&query, &id).await;
    assert_eq!(info["complete"], json!(true));
    assert_eq!(info["success"], json!(false));
    assert_eq!(info["progress"]["percent"], json!(100.0));
    assert_eq!(info["result"], json!("disk full"));

    assert_eq!(store.records().len(), 1);
}

#[tokio::test]
async fn test_unrecognized_state_passes_through() {
    let (channel, query) = setup();
    let id = TaskId::new();
    let raw = json!({"exc": "Timeout", "retries": 2});
    channel
        .update_state(&id, TaskState::from("RETRY"), raw.clone())
        .await
        .unwrap();

    let response = query.get_info(&id).await.unwrap();
    assert_eq!(response, ProgressResponse::Raw(raw));
}

#[tokio::test]
async fn test_concurrent_pollers_see_latest_snapshot() {
    let (channel, query) = setup();
    let id = TaskId::new();
    let reporter = ChannelReporter::new(id, channel.clone());
    reporter.set_progress(9, 10, "almost").await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let query = query.clone();
        handles.push(tokio::spawn(async move {
            query.get_info(&id).await.unwrap()
        }));
    }

    for handle in handles {
        let response = handle.await.unwrap();
        let snapshot = response.info().unwrap().snapshot().unwrap();
        assert_eq!(snapshot.current(), 9);
        assert_eq!(snapshot.percent(), 90.0);
    }
}
