use actix_middleware::{get_correlation_id, UserId};
use actix_web::{web, HttpRequest, HttpResponse};
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::metrics;
use crate::models::{CommentEntry, CommentsResponse, CreateCommentRequest, ErrorBody};
use crate::AppState;

/// Add a comment to a post as the authenticated caller
#[utoipa::path(
    post,
    path = "/posts/{post_id}/comments",
    tag = "comments",
    params(("post_id" = Uuid, Path, description = "Post to comment on")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment appended", body = CommentEntry),
        (status = 400, description = "Empty or overlong text", body = ErrorBody),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorBody),
        (status = 404, description = "Post not found", body = ErrorBody),
        (status = 503, description = "Storage unavailable, retry later", body = ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_comment(
    http_req: HttpRequest,
    user_id: UserId,
    post_id: web::Path<Uuid>,
    body: web::Json<CreateCommentRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let post_id = post_id.into_inner();
    debug!(
        correlation_id = %get_correlation_id(&http_req),
        post_id = %post_id,
        user_id = %user_id.0,
        "Create comment request"
    );

    let result = state
        .comments
        .post_comment(post_id, user_id.0, &body.text)
        .await;
    metrics::observe_comment_append(metrics::outcome(&result));

    Ok(HttpResponse::Created().json(result?))
}

/// Full comment thread of a post, oldest first
#[utoipa::path(
    get,
    path = "/posts/{post_id}/comments",
    tag = "comments",
    params(("post_id" = Uuid, Path, description = "Post whose comments to list")),
    responses(
        (status = 200, description = "Comment thread", body = CommentsResponse),
        (status = 404, description = "Post not found", body = ErrorBody),
        (status = 503, description = "Storage unavailable, retry later", body = ErrorBody)
    )
)]
pub async fn list_comments(
    post_id: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let items = state.comments.list_comments(post_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(CommentsResponse { items }))
}
