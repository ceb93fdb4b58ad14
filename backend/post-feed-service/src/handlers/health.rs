//! Liveness and readiness probes.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Serialize;
use std::time::Instant;
use tracing::warn;

use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum ComponentStatus {
    Healthy,
    Unhealthy,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    store: ComponentStatus,
    message: String,
    latency_ms: u64,
    timestamp: String,
}

/// Process is up; does not touch the store.
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "post-feed-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Ready when the store answers a ping.
pub async fn readiness(state: web::Data<AppState>) -> HttpResponse {
    let start = Instant::now();
    let result = state.store.ping().await;
    let latency_ms = start.elapsed().as_millis() as u64;

    let (ready, store, message) = match result {
        Ok(()) => (true, ComponentStatus::Healthy, "store reachable".to_string()),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            (false, ComponentStatus::Unhealthy, "store unreachable".to_string())
        }
    };

    let response = ReadinessResponse {
        ready,
        store,
        message,
        latency_ms,
        timestamp: Utc::now().to_rfc3339(),
    };

    if ready {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}
