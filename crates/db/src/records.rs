// crates/db/src/records.rs
// Progress record writes (used by reporters) and reads (used by dashboards).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use task_progress_core::{
    NewProgressRecord, PersistenceError, Principal, ProgressPersistence, ProgressRecord,
    RecordState, TaskId,
};

use crate::{Database, DbError, DbResult};

type RecordRow = (i64, String, bool, String, String, i64);

const SELECT_RECORD: &str =
    "SELECT id, task_id, completed, user_id, state, created_at FROM progress_records";

fn record_from_row(row: RecordRow) -> DbResult<ProgressRecord> {
    let (id, task_id, completed, user_id, state, created_at) = row;
    let invalid = |message: String| DbError::InvalidRow {
        table: "progress_records",
        message,
    };

    let task_id: TaskId = task_id
        .parse()
        .map_err(|e| invalid(format!("task_id {task_id:?}: {e}")))?;
    let state = RecordState::parse(&state).ok_or_else(|| invalid(format!("state {state:?}")))?;
    let created_at = DateTime::<Utc>::from_timestamp_millis(created_at)
        .ok_or_else(|| invalid(format!("created_at {created_at}")))?;

    Ok(ProgressRecord {
        id,
        task_id,
        completed,
        user: Principal::new(user_id),
        state,
        created_at,
    })
}

impl Database {
    /// Insert a progress record and return it with its assigned id.
    pub async fn insert_progress_record(
        &self,
        record: &NewProgressRecord,
    ) -> DbResult<ProgressRecord> {
        let created_at = Utc::now();
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO progress_records (task_id, completed, user_id, state, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id
            "#,
        )
        .bind(record.task_id.to_string())
        .bind(record.completed)
        .bind(record.user.as_str())
        .bind(record.state.as_str())
        .bind(created_at.timestamp_millis())
        .fetch_one(self.pool())
        .await?;

        tracing::debug!(record_id = id, task_id = %record.task_id, "Inserted progress record");

        Ok(ProgressRecord {
            id,
            task_id: record.task_id,
            completed: record.completed,
            user: record.user.clone(),
            state: record.state,
            // Round-trip through millis so the value matches what a read returns.
            created_at: DateTime::<Utc>::from_timestamp_millis(created_at.timestamp_millis())
                .unwrap_or(created_at),
        })
    }

    /// All records for a job id, oldest first (one per attempt).
    pub async fn get_progress_records(&self, task_id: &TaskId) -> DbResult<Vec<ProgressRecord>> {
        let rows: Vec<RecordRow> =
            sqlx::query_as(&format!("{SELECT_RECORD} WHERE task_id = ?1 ORDER BY id ASC"))
                .bind(task_id.to_string())
                .fetch_all(self.pool())
                .await?;

        rows.into_iter().map(record_from_row).collect()
    }

    /// Most recent records owned by `user`, newest first.
    pub async fn list_progress_records_for_user(
        &self,
        user: &Principal,
        limit: i64,
    ) -> DbResult<Vec<ProgressRecord>> {
        let rows: Vec<RecordRow> = sqlx::query_as(&format!(
            "{SELECT_RECORD} WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2"
        ))
        .bind(user.as_str())
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(record_from_row).collect()
    }

    /// Number of stored records.
    pub async fn count_progress_records(&self) -> DbResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM progress_records")
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl ProgressPersistence for Database {
    async fn create(&self, record: NewProgressRecord) -> Result<ProgressRecord, PersistenceError> {
        self.insert_progress_record(&record).await.map_err(|e| {
            tracing::error!(error = %e, task_id = %record.task_id, "Failed to store progress record");
            PersistenceError::storage(e)
        })
    }
}
