// crates/core/src/reporter.rs
//! Progress reporters handed to running jobs.
//!
//! - [`ConsoleReporter`] prints progress lines for local debugging
//! - [`ChannelReporter`] publishes snapshots into the job's status channel
//! - [`PersistentChannelReporter`] also records the job in a durable store
//!
//! [`Reporter`] is the closed set of the three, picked when a job is built.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::channel::StatusChannel;
use crate::error::ReportError;
use crate::persistence::{NewProgressRecord, Principal, ProgressPersistence, ProgressRecord};
use crate::snapshot::{FailureInfo, ProgressSnapshot, TaskError};
use crate::state::{TaskId, TaskState};

/// Capability a running job uses to publish its progress.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    /// Publish `current` out of `total` units of work done.
    async fn set_progress(
        &self,
        current: u64,
        total: u64,
        description: &str,
    ) -> Result<(), ReportError>;

    /// Publish a terminal failure.
    async fn stop_task(
        &self,
        current: u64,
        total: u64,
        error: &TaskError,
    ) -> Result<(), ReportError>;
}

/// Writes one human-readable line per progress update.
pub struct ConsoleReporter<W = io::Stderr> {
    out: Mutex<W>,
}

impl ConsoleReporter<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl Default for ConsoleReporter<io::Stderr> {
    fn default() -> Self {
        Self::stderr()
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Recover the writer, e.g. to inspect captured output.
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_line(&self, current: u64, total: u64, description: &str) {
        let mut out = match self.out.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(out, "processed {current} items of {total}. {description}") {
            tracing::warn!(error = %e, "Failed to write progress line");
        }
    }
}

#[async_trait]
impl<W: Write + Send> ProgressReporter for ConsoleReporter<W> {
    async fn set_progress(
        &self,
        current: u64,
        total: u64,
        description: &str,
    ) -> Result<(), ReportError> {
        self.write_line(current, total, description);
        Ok(())
    }

    async fn stop_task(
        &self,
        _current: u64,
        _total: u64,
        _error: &TaskError,
    ) -> Result<(), ReportError> {
        Ok(())
    }
}

/// Publishes progress into the job-queue's status channel.
///
/// The channel keeps only the latest write. After [`stop_task`] the reporter
/// is finished and further calls are ignored.
///
/// [`stop_task`]: ProgressReporter::stop_task
pub struct ChannelReporter {
    task_id: TaskId,
    channel: Arc<dyn StatusChannel>,
    stopped: AtomicBool,
}

impl ChannelReporter {
    pub fn new(task_id: TaskId, channel: Arc<dyn StatusChannel>) -> Self {
        Self {
            task_id,
            channel,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Whether a terminal failure was already published.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

#[async_trait]
impl ProgressReporter for ChannelReporter {
    async fn set_progress(
        &self,
        current: u64,
        total: u64,
        description: &str,
    ) -> Result<(), ReportError> {
        if self.is_stopped() {
            tracing::warn!(task_id = %self.task_id, "Ignoring progress for a stopped task");
            return Ok(());
        }

        let snapshot = ProgressSnapshot::new(current, total, description);
        let meta = serde_json::to_value(&snapshot).map_err(crate::ChannelError::backend)?;
        self.channel
            .update_state(&self.task_id, TaskState::InProgress, meta)
            .await?;
        tracing::debug!(
            task_id = %self.task_id,
            current,
            total,
            percent = snapshot.percent(),
            "Progress published"
        );
        Ok(())
    }

    async fn stop_task(
        &self,
        current: u64,
        total: u64,
        error: &TaskError,
    ) -> Result<(), ReportError> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            tracing::warn!(task_id = %self.task_id, "Task already stopped");
            return Ok(());
        }

        let info = FailureInfo::new(current, total, error);
        let published = match serde_json::to_value(&info) {
            Ok(meta) => self
                .channel
                .update_state(&self.task_id, TaskState::Failure, meta)
                .await
                .map_err(ReportError::from),
            Err(e) => Err(crate::ChannelError::backend(e).into()),
        };
        // Nothing reached the channel: let a retry publish the failure.
        if let Err(e) = published {
            self.stopped.store(false, Ordering::Release);
            tracing::warn!(task_id = %self.task_id, error = %e, "Failed to publish stop");
            return Err(e);
        }
        tracing::info!(
            task_id = %self.task_id,
            exc_type = error.kind(),
            exc_message = error.message(),
            "Task stopped"
        );
        Ok(())
    }
}

/// A [`ChannelReporter`] whose job is also recorded in a durable store.
///
/// The record is written once, at construction; progress and failure calls
/// go to the channel only.
pub struct PersistentChannelReporter {
    inner: ChannelReporter,
    record: ProgressRecord,
}

impl PersistentChannelReporter {
    /// Record the job as owned by `user`, then wrap a channel reporter for it.
    pub async fn create(
        task_id: TaskId,
        channel: Arc<dyn StatusChannel>,
        store: &dyn ProgressPersistence,
        user: Principal,
    ) -> Result<Self, ReportError> {
        let record = store.create(NewProgressRecord::new(task_id, user)).await?;
        tracing::debug!(task_id = %task_id, record_id = record.id, user = %record.user, "Task recorded");
        Ok(Self {
            inner: ChannelReporter::new(task_id, channel),
            record,
        })
    }

    pub fn task_id(&self) -> TaskId {
        self.inner.task_id()
    }

    /// The record created for this job.
    pub fn record(&self) -> &ProgressRecord {
        &self.record
    }

    pub fn channel_reporter(&self) -> &ChannelReporter {
        &self.inner
    }
}

#[async_trait]
impl ProgressReporter for PersistentChannelReporter {
    async fn set_progress(
        &self,
        current: u64,
        total: u64,
        description: &str,
    ) -> Result<(), ReportError> {
        self.inner.set_progress(current, total, description).await
    }

    async fn stop_task(
        &self,
        current: u64,
        total: u64,
        error: &TaskError,
    ) -> Result<(), ReportError> {
        self.inner.stop_task(current, total, error).await
    }
}

/// The reporter variant a job was built with.
pub enum Reporter {
    Console(ConsoleReporter),
    Channel(ChannelReporter),
    PersistentChannel(PersistentChannelReporter),
}

#[async_trait]
impl ProgressReporter for Reporter {
    async fn set_progress(
        &self,
        current: u64,
        total: u64,
        description: &str,
    ) -> Result<(), ReportError> {
        match self {
            Reporter::Console(r) => r.set_progress(current, total, description).await,
            Reporter::Channel(r) => r.set_progress(current, total, description).await,
            Reporter::PersistentChannel(r) => r.set_progress(current, total, description).await,
        }
    }

    async fn stop_task(
        &self,
        current: u64,
        total: u64,
        error: &TaskError,
    ) -> Result<(), ReportError> {
        match self {
            Reporter::Console(r) => r.stop_task(current, total, error).await,
            Reporter::Channel(r) => r.stop_task(current, total, error).await,
            Reporter::PersistentChannel(r) => r.stop_task(current, total, error).await,
        }
    }
}

impl From<ConsoleReporter> for Reporter {
    fn from(value: ConsoleReporter) -> Self {
        Reporter::Console(value)
    }
}

impl From<ChannelReporter> for Reporter {
    fn from(value: ChannelReporter) -> Self {
        Reporter::Channel(value)
    }
}

impl From<PersistentChannelReporter> for Reporter {
    fn from(value: PersistentChannelReporter) -> Self {
        Reporter::PersistentChannel(value)
    }
}
