/// Business logic layer for post-feed-service
///
/// - Feed service: paginated feed assembly
/// - Comment service: comment validation, append and thread reads
pub mod comments;
pub mod feed;

pub use comments::CommentService;
pub use feed::{FeedPage, FeedService};

use std::future::Future;
use std::time::Duration;

use crate::db::StoreResult;
use crate::error::Result;

/// Run a Store read, failing with a storage error once `limit` elapses.
pub(crate) async fn bounded_read<T, F>(limit: Duration, read: F) -> Result<T>
where
    F: Future<Output = StoreResult<T>>,
{
    Ok(tokio::time::timeout(limit, read).await??)
}
