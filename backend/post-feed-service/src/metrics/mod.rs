//! Prometheus metrics for post-feed-service.
//!
//! Feed and comment collectors plus the `/metrics` handler.

use actix_web::HttpResponse;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

use crate::error::AppError;

lazy_static! {
    /// Feed requests by outcome (ok, validation_error, not_found, storage_unavailable).
    pub static ref FEED_REQUEST_TOTAL: IntCounterVec = register_int_counter_vec!(
        "feed_request_total",
        "Total feed requests segmented by outcome",
        &["outcome"]
    )
    .expect("failed to register feed_request_total");

    pub static ref FEED_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "feed_request_duration_seconds",
        "Feed request duration segmented by outcome",
        &["outcome"]
    )
    .expect("failed to register feed_request_duration_seconds");

    /// Comment append attempts by outcome.
    pub static ref COMMENT_APPEND_TOTAL: IntCounterVec = register_int_counter_vec!(
        "comment_append_total",
        "Comment append attempts segmented by outcome",
        &["outcome"]
    )
    .expect("failed to register comment_append_total");
}

/// Label value for a request result
pub fn outcome<T>(result: &Result<T, AppError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(err) => err.code(),
    }
}

pub fn observe_feed_request(outcome: &str, seconds: f64) {
    FEED_REQUEST_TOTAL.with_label_values(&[outcome]).inc();
    FEED_REQUEST_DURATION_SECONDS
        .with_label_values(&[outcome])
        .observe(seconds);
}

pub fn observe_comment_append(outcome: &str) {
    COMMENT_APPEND_TOTAL.with_label_values(&[outcome]).inc();
}

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
