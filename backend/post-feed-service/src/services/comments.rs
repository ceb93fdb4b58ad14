/// Comment service - validates and appends comments, reads comment threads
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::bounded_read;
use crate::config::FeedConfig;
use crate::db::{Store, StoreError};
use crate::error::{AppError, Result};
use crate::models::{CommentEntry, NewComment};

pub struct CommentService {
    store: Arc<dyn Store>,
    max_length: usize,
    read_timeout: Duration,
}

/// Trim `text` and check it is non-empty and at most `max_length` characters.
pub fn normalize_comment_text(text: &str, max_length: usize) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(
            "comment text must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > max_length {
        return Err(AppError::Validation(format!(
            "comment text exceeds {max_length} characters"
        )));
    }
    Ok(trimmed.to_string())
}

impl CommentService {
    pub fn new(store: Arc<dyn Store>, config: &FeedConfig) -> Self {
        Self {
            store,
            max_length: config.comment_max_length,
            read_timeout: config.read_timeout,
        }
    }

    /// Append a comment by `author_id` to `post_id`.
    ///
    /// Lookups run first so a missing post never reaches the append. The
    /// append itself runs on a detached task: once handed to the Store it
    /// completes even if the caller goes away.
    pub async fn post_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        text: &str,
    ) -> Result<CommentEntry> {
        let text = normalize_comment_text(text, self.max_length)?;

        bounded_read(self.read_timeout, self.store.get_post(post_id)).await?;

        let author = match tokio::time::timeout(self.read_timeout, self.store.get_author(author_id))
            .await?
        {
            Ok(author) => author,
            Err(StoreError::NotFound { .. }) => {
                warn!(user_id = %author_id, "Authenticated caller has no user record");
                return Err(AppError::Unauthorized(
                    "caller has no user record".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let store = Arc::clone(&self.store);
        let new_comment = NewComment {
            post_id,
            author_id,
            text,
        };
        let comment = tokio::spawn(async move { store.append_comment(new_comment).await })
            .await??;

        info!(
            comment_id = %comment.id,
            post_id = %post_id,
            user_id = %author_id,
            "Comment created"
        );

        Ok(CommentEntry { comment, author })
    }

    /// Full thread for one post, oldest first.
    pub async fn list_comments(&self, post_id: Uuid) -> Result<Vec<CommentEntry>> {
        bounded_read(self.read_timeout, self.store.get_comments(post_id)).await
    }
}
