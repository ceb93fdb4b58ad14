/// HTTP handlers for post-feed-service
///
/// - Feed: paginated newest-first posts with authors and comments
/// - Comments: append and list comments of one post
/// - Health: liveness and readiness probes
pub mod comments;
pub mod feed;
pub mod health;

pub use comments::{create_comment, list_comments};
pub use feed::get_feed;
pub use health::{health, readiness};
