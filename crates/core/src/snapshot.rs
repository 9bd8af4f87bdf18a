// crates/core/src/snapshot.rs
//! Progress payloads published into the status channel.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Percentage of `current` over `total`, rounded to two decimal places.
///
/// Uses exact integer arithmetic and rounds half to even on the hundredths
/// digit. A `total` of zero means "unknown" and yields `0.0`.
pub fn percent(current: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }

    let scaled = u128::from(current) * 10_000;
    let total = u128::from(total);
    let mut hundredths = scaled / total;
    let remainder = scaled % total;

    match (remainder * 2).cmp(&total) {
        Ordering::Greater => hundredths += 1,
        Ordering::Equal if hundredths % 2 == 1 => hundredths += 1,
        _ => {}
    }

    hundredths as f64 / 100.0
}

/// A single progress reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pending: bool,
    current: u64,
    total: u64,
    percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl ProgressSnapshot {
    /// Snapshot published by a running job. `percent` is derived.
    pub fn new(current: u64, total: u64, description: impl Into<String>) -> Self {
        Self {
            pending: false,
            current,
            total,
            percent: percent(current, total),
            description: Some(description.into()),
        }
    }

    /// Synthetic snapshot for a job that reached a terminal state.
    pub fn completed() -> Self {
        Self {
            pending: false,
            current: 100,
            total: 100,
            percent: 100.0,
            description: None,
        }
    }

    /// Synthetic snapshot for a queued or started job that has not reported yet.
    pub fn unknown(pending: bool) -> Self {
        Self {
            pending,
            current: 0,
            total: 100,
            percent: 0.0,
            description: None,
        }
    }

    pub fn pending(&self) -> bool {
        self.pending
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// String rendering of an error raised inside a job.
///
/// Only the kind and the message survive; the original error value is not
/// kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskError {
    kind: String,
    message: String,
}

impl TaskError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Capture an error's type name and display text.
    ///
    /// The kind is the static type name of `E`, so callers holding a boxed
    /// `dyn Error` must build the [`TaskError`] with [`TaskError::new`].
    pub fn from_error<E>(error: &E) -> Self
    where
        E: std::error::Error,
    {
        Self {
            kind: std::any::type_name::<E>().to_string(),
            message: error.to_string(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Terminal payload published when a job stops on an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureInfo {
    pending: bool,
    current: u64,
    total: u64,
    percent: f64,
    exc_message: String,
    exc_type: String,
}

impl FailureInfo {
    /// Failure is reported as a halted attempt, so `percent` is always 100.
    pub fn new(current: u64, total: u64, error: &TaskError) -> Self {
        Self {
            pending: false,
            current,
            total,
            percent: 100.0,
            exc_message: error.message.clone(),
            exc_type: error.kind.clone(),
        }
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    pub fn exc_message(&self) -> &str {
        &self.exc_message
    }

    pub fn exc_type(&self) -> &str {
        &self.exc_type
    }
}
