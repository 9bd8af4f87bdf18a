// crates/core/src/lib.rs
//! Task progress reporting protocol.
//!
//! Long-running jobs publish progress through a [`ProgressReporter`] into the
//! job-queue's [`StatusChannel`]; pollers read it back, normalized, through
//! [`ProgressQuery`]. [`ProgressPersistence`] records submitted jobs for
//! dashboards and audits.

pub mod channel;
pub mod error;
pub mod persistence;
pub mod query;
pub mod reporter;
pub mod snapshot;
pub mod state;

pub use channel::{InMemoryStatusChannel, StatusChannel, DEFAULT_RESULT_RETENTION};
pub use error::*;
pub use persistence::{
    InMemoryPersistence, NewProgressRecord, Principal, ProgressPersistence, ProgressRecord,
    RecordState,
};
pub use query::{ProgressInfo, ProgressQuery, ProgressResponse, Resolution, DEFAULT_JOIN_TIMEOUT};
pub use reporter::{
    ChannelReporter, ConsoleReporter, PersistentChannelReporter, ProgressReporter, Reporter,
};
pub use snapshot::{percent, FailureInfo, ProgressSnapshot, TaskError};
pub use state::{TaskId, TaskState, TaskStatus, PROGRESS_STATE};
