/// Feed service - assembles newest-first pages of posts with authors and comments
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::bounded_read;
use crate::config::FeedConfig;
use crate::db::{FeedCursor, FeedPageRecords, PageRequest, Store};
use crate::error::{AppError, Result};
use crate::models::FeedItem;

/// One rendered feed page
#[derive(Debug)]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    pub next_cursor: Option<FeedCursor>,
}

pub struct FeedService {
    store: Arc<dyn Store>,
    default_page_size: usize,
    max_page_size: usize,
    read_timeout: Duration,
}

impl FeedService {
    pub fn new(store: Arc<dyn Store>, config: &FeedConfig) -> Self {
        Self {
            store,
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
            read_timeout: config.read_timeout,
        }
    }

    /// Effective page size: default when absent, capped at `max`. Zero is rejected.
    pub fn page_size(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            None => Ok(self.default_page_size),
            Some(0) => Err(AppError::Validation(
                "limit must be a positive integer".to_string(),
            )),
            Some(n) => Ok(n.min(self.max_page_size)),
        }
    }

    /// List one feed page.
    ///
    /// `cursor` is the opaque value from a previous page's `next_cursor`. The
    /// page is all-or-nothing: a post whose author record is missing fails the
    /// whole request rather than being rendered with a placeholder.
    pub async fn list_feed(&self, cursor: Option<&str>, limit: Option<usize>) -> Result<FeedPage> {
        let cursor = cursor
            .filter(|raw| !raw.trim().is_empty())
            .map(FeedCursor::decode)
            .transpose()?;
        let page = PageRequest {
            limit: self.page_size(limit)?,
            cursor,
        };

        let records = bounded_read(self.read_timeout, self.store.load_feed_page(&page)).await?;
        debug!(
            posts = records.posts.len(),
            has_more = records.next_cursor.is_some(),
            "Feed page loaded"
        );

        assemble(records)
    }
}

fn assemble(records: FeedPageRecords) -> Result<FeedPage> {
    let FeedPageRecords {
        posts,
        authors,
        mut comments,
        next_cursor,
    } = records;

    let items = posts
        .into_iter()
        .map(|post| {
            let author = authors.get(&post.author_id).cloned().ok_or_else(|| {
                warn!(post_id = %post.id, author_id = %post.author_id, "Post author missing");
                AppError::NotFound(format!("user {}", post.author_id))
            })?;
            let comments = comments.remove(&post.id).unwrap_or_default();
            Ok(FeedItem {
                post,
                author,
                comments,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(FeedPage { items, next_cursor })
}
