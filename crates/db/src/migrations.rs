/// Inline SQL migrations for the task progress schema.
///
/// One statement per entry; the index (1-based) is the version recorded in
/// `_migrations`.

pub const MIGRATIONS: &[&str] = &[
    // Migration 1: progress records
    r#"
CREATE TABLE IF NOT EXISTS progress_records (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id    TEXT NOT NULL,
    completed  BOOLEAN NOT NULL DEFAULT 0,
    user_id    TEXT NOT NULL,
    state      TEXT NOT NULL DEFAULT 'PENDING',
    created_at INTEGER NOT NULL
);
"#,
    // Migration 2: lookup by job id
    r#"CREATE INDEX IF NOT EXISTS idx_progress_records_task ON progress_records(task_id);"#,
    // Migration 3: per-owner listing, newest first
    r#"CREATE INDEX IF NOT EXISTS idx_progress_records_user ON progress_records(user_id, created_at DESC);"#,
];
