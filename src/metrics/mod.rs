//! Metrics module
//!
//! Provides Prometheus metrics for uploads.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "oss_uploadr_uploads_total",
        "Total number of uploads",
        &["kind", "status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "oss_uploadr_upload_bytes_total",
        "Total bytes uploaded"
    ).unwrap();

    pub static ref UPLOAD_DURATION: HistogramVec = register_histogram_vec!(
        "oss_uploadr_upload_duration_seconds",
        "Upload duration in seconds",
        &["kind"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]
    ).unwrap();

    // Rejections and failures
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "oss_uploadr_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

/// Record a successful upload
pub fn record_upload_success(kind: &str, bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&[kind, "success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed upload
pub fn record_upload_failure(kind: &str) {
    UPLOADS_TOTAL.with_label_values(&[kind, "failure"]).inc();
}

/// Record upload duration
pub fn record_upload_duration(kind: &str, duration_secs: f64) {
    UPLOAD_DURATION
        .with_label_values(&[kind])
        .observe(duration_secs);
}

/// Record an error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

/// Render every registered metric in the text exposition format
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
