// crates/server/src/metrics.rs
//! Application metrics for Prometheus monitoring.
//!
//! This module provides:
//! - Prometheus metrics recorder initialization
//! - Metric definitions (counters, gauges)
//! - Helper functions for recording metrics
//!
//! Recording before `init_metrics` (e.g. in unit tests) is a no-op.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return false;
    }

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("Failed to set global metrics recorder (already set)");
        return false;
    }

    if PROMETHEUS_HANDLE.set(handle).is_err() {
        tracing::warn!("Failed to store Prometheus handle (already set)");
    }

    describe_metrics();

    tracing::info!("Prometheus metrics initialized");
    true
}

fn describe_metrics() {
    describe_counter!("downloads_started_total", "Download jobs accepted");
    describe_counter!(
        "downloads_completed_total",
        "Download jobs that produced an artifact"
    );
    describe_counter!(
        "downloads_failed_total",
        "Download jobs that ended in failure or cancellation"
    );
    describe_counter!("artifacts_served_total", "Artifact transfers started");
    describe_counter!(
        "artifacts_cleaned_total",
        "Artifacts deleted after their grace period"
    );
    describe_gauge!("observers_connected", "Connected progress observers");
}

/// Render current metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

pub fn record_job_started() {
    counter!("downloads_started_total").increment(1);
}

pub fn record_job_finished(success: bool) {
    if success {
        counter!("downloads_completed_total").increment(1);
    } else {
        counter!("downloads_failed_total").increment(1);
    }
}

pub fn record_artifact_served() {
    counter!("artifacts_served_total").increment(1);
}

pub fn record_artifact_cleaned() {
    counter!("artifacts_cleaned_total").increment(1);
}

pub fn set_observers_connected(count: usize) {
    gauge!("observers_connected").set(count as f64);
}
