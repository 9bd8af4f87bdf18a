//! Application metrics for Prometheus monitoring.
//!
//! This module provides:
//! - Prometheus metrics recorder initialization
//! - Helpers for request timing, query resolutions and task outcomes

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use task_progress_core::Resolution;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Call once at startup, before any metrics are recorded.
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    let mut installed = false;
    // Concurrent callers block here until the first one has installed the recorder.
    PROMETHEUS_HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        if metrics::set_global_recorder(recorder).is_err() {
            tracing::warn!("Failed to set global metrics recorder (already set)");
        } else {
            describe_metrics();
            installed = true;
            tracing::info!("Prometheus metrics initialized");
        }
        handle
    });
    installed
}

fn describe_metrics() {
    describe_counter!(
        "progress_requests_total",
        "Total number of API requests by endpoint and status"
    );
    describe_histogram!(
        "progress_request_duration_seconds",
        "Duration of API requests in seconds"
    );
    describe_counter!(
        "progress_query_resolutions_total",
        "Progress queries by the state class that answered them"
    );
    describe_counter!(
        "progress_tasks_finished_total",
        "Tasks run by the in-process runner, by outcome"
    );
    describe_gauge!("progress_tasks_running", "Tasks currently running in-process");
}

/// Render current metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

/// Record a completed API request.
pub fn record_request(endpoint: &str, status: &str, duration: Duration) {
    counter!("progress_requests_total", "endpoint" => endpoint.to_string(), "status" => status.to_string())
        .increment(1);
    histogram!("progress_request_duration_seconds", "endpoint" => endpoint.to_string())
        .record(duration.as_secs_f64());
}

/// Count a progress query by the branch that resolved it.
pub fn record_resolution(resolution: Resolution) {
    counter!("progress_query_resolutions_total", "resolution" => resolution.as_str()).increment(1);
}

/// Count a finished in-process task. `outcome` is "success" or "failure".
pub fn record_task_finished(outcome: &'static str) {
    counter!("progress_tasks_finished_total", "outcome" => outcome).increment(1);
}

pub fn set_tasks_running(count: usize) {
    gauge!("progress_tasks_running").set(count as f64);
}

/// Helper for timing request handlers.
///
/// ```ignore
/// let timer = RequestTimer::new("progress");
/// // ... do work ...
/// timer.finish_ok(); // or timer.finish_err(status_code)
/// ```
pub struct RequestTimer {
    endpoint: String,
    start: Instant,
}

impl RequestTimer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            start: Instant::now(),
        }
    }

    pub fn finish_ok(self) {
        record_request(&self.endpoint, "200", self.start.elapsed());
    }

    pub fn finish_err(self, status: u16) {
        record_request(&self.endpoint, &status.to_string(), self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_timer() {
        let timer = RequestTimer::new("test_endpoint");
        std::thread::sleep(Duration::from_millis(1));
        timer.finish_ok();
    }

    #[test]
    fn test_recorders_without_init_do_not_panic() {
        record_resolution(Resolution::Waiting);
        record_task_finished("success");
        set_tasks_running(3);
    }

    #[test]
    fn test_rendered_metrics_include_resolutions() {
        init_metrics();
        record_resolution(Resolution::Passthrough);

        let rendered = render_metrics().expect("metrics initialized");
        assert!(rendered.contains("progress_query_resolutions_total"));
        assert!(rendered.contains("passthrough"));
    }
}
