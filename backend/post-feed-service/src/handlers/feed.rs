use actix_web::{web, HttpRequest, HttpResponse};
use actix_middleware::get_correlation_id;
use serde::Deserialize;
use std::time::Instant;
use tracing::debug;
use utoipa::IntoParams;

use crate::error::Result;
use crate::metrics;
use crate::models::FeedResponse;
use crate::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FeedQueryParams {
    /// Opaque cursor from a previous page's `nextCursor`
    pub cursor: Option<String>,
    /// Page size, at least 1 and capped at 100 (default 20)
    pub limit: Option<usize>,
}

/// Newest-first feed page
#[utoipa::path(
    get,
    path = "/feed",
    tag = "feed",
    params(FeedQueryParams),
    responses(
        (status = 200, description = "Feed page", body = FeedResponse),
        (status = 400, description = "Malformed cursor or limit", body = crate::models::ErrorBody),
        (status = 404, description = "A post's author record is missing", body = crate::models::ErrorBody),
        (status = 503, description = "Storage unavailable, retry later", body = crate::models::ErrorBody)
    )
)]
pub async fn get_feed(
    http_req: HttpRequest,
    query: web::Query<FeedQueryParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let started = Instant::now();
    debug!(
        correlation_id = %get_correlation_id(&http_req),
        limit = ?query.limit,
        has_cursor = query.cursor.is_some(),
        "Feed request"
    );

    let result = state
        .feed
        .list_feed(query.cursor.as_deref(), query.limit)
        .await;
    metrics::observe_feed_request(
        metrics::outcome(&result),
        started.elapsed().as_secs_f64(),
    );
    let page = result?;

    Ok(HttpResponse::Ok().json(FeedResponse {
        items: page.items,
        next_cursor: page.next_cursor.map(|c| c.encode()),
    }))
}
