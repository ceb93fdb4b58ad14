/// Post Feed Service Library
///
/// Serves a newest-first feed of photo posts, each with its author and its
/// append-only comment thread, and accepts new comments from authenticated
/// users.
///
/// # Modules
///
/// - `handlers`: HTTP request handlers
/// - `models`: Users, posts, comments and API payloads
/// - `services`: Feed assembly and comment validation
/// - `db`: `Store` trait with PostgreSQL and in-memory implementations
/// - `error`: Error types and HTTP mapping
/// - `config`: Configuration management
/// - `metrics`: Prometheus collectors
/// - `openapi`: OpenAPI document
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod openapi;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};

use actix_web::web;
use std::sync::Arc;

use crate::config::FeedConfig;
use crate::db::Store;
use crate::services::{CommentService, FeedService};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub feed: Arc<FeedService>,
    pub comments: Arc<CommentService>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, feed_config: &FeedConfig) -> Self {
        Self {
            feed: Arc::new(FeedService::new(Arc::clone(&store), feed_config)),
            comments: Arc::new(CommentService::new(Arc::clone(&store), feed_config)),
            store,
        }
    }
}

/// Register all routes plus extractor error handlers that answer in the
/// service's JSON error format.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
    )
    .app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
    )
    .route("/health", web::get().to(handlers::health))
    .route("/ready", web::get().to(handlers::readiness))
    .route("/metrics", web::get().to(metrics::serve_metrics))
    .route("/api/v1/openapi.json", web::get().to(openapi::serve_openapi))
    .route("/feed", web::get().to(handlers::get_feed))
    .service(
        web::resource("/posts/{post_id}/comments")
            .route(web::get().to(handlers::list_comments))
            .route(web::post().to(handlers::create_comment)),
    );
}
