/// OpenAPI documentation for post-feed-service
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;

use crate::models::{
    Comment, CommentEntry, CommentsResponse, CreateCommentRequest, ErrorBody, ErrorDetail,
    FeedItem, FeedResponse, Post, User,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Nova Post Feed Service API",
        version = "1.0.0",
        description = "Newest-first photo feed with per-post comment threads. Comments are append-only; reads are paginated with opaque keyset cursors.",
        contact(
            name = "Nova Team",
            email = "support@nova.app"
        ),
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8082", description = "Development server"),
    ),
    paths(
        crate::handlers::feed::get_feed,
        crate::handlers::comments::create_comment,
        crate::handlers::comments::list_comments,
    ),
    components(schemas(
        User,
        Post,
        Comment,
        CommentEntry,
        FeedItem,
        FeedResponse,
        CommentsResponse,
        CreateCommentRequest,
        ErrorBody,
        ErrorDetail,
    )),
    tags(
        (name = "feed", description = "Paginated post feed"),
        (name = "comments", description = "Append-only comment threads"),
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT bearer token issued by the identity service"))
                        .build(),
                ),
            )
        }
    }
}

/// Serves the generated document at `/api/v1/openapi.json`
pub async fn serve_openapi() -> actix_web::HttpResponse {
    actix_web::HttpResponse::Ok().json(ApiDoc::openapi())
}
