/// Storage layer for post-feed-service
///
/// The [`Store`] trait is the only way services reach persisted data. Two
/// implementations ship with the service:
/// - `postgres`: PostgreSQL via sqlx (production)
/// - `memory`: process-local store (tests, local development)
///
/// Both guarantee that concurrent `append_comment` calls on one post serialize
/// without losing writes, and that `load_feed_page` reads one consistent
/// snapshot.
pub mod memory;
pub mod postgres;

pub use memory::{InMemoryStore, SeedData};
pub use postgres::PgStore;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Comment, CommentEntry, NewComment, Post, User};

/// Page size used when the caller does not ask for one
pub const DEFAULT_PAGE_SIZE: usize = 20;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend unreachable, timed out, or failed mid-operation. Retryable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    /// Duplicate key on out-of-band inserts
    #[error("conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    pub fn post_not_found(id: Uuid) -> Self {
        StoreError::NotFound { entity: "post", id }
    }

    pub fn user_not_found(id: Uuid) -> Self {
        StoreError::NotFound { entity: "user", id }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return StoreError::Conflict(db_err.message().to_string());
            }
        }
        StoreError::Unavailable(err.to_string())
    }
}

// =====================================================================
// Cursor
// =====================================================================

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid cursor")]
pub struct InvalidCursor;

/// Keyset position in the feed: the last post already returned.
///
/// Encoded as URL-safe base64 of `"<created_at micros>:<post id>"`; clients
/// must treat it as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedCursor {
    pub created_at: DateTime<Utc>,
    pub post_id: Uuid,
}

impl FeedCursor {
    pub fn after(post: &Post) -> Self {
        Self {
            created_at: post.created_at,
            post_id: post.id,
        }
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!(
            "{}:{}",
            self.created_at.timestamp_micros(),
            self.post_id
        ))
    }

    pub fn decode(raw: &str) -> Result<Self, InvalidCursor> {
        let bytes = URL_SAFE_NO_PAD
            .decode(raw.trim())
            .map_err(|_| InvalidCursor)?;
        let text = String::from_utf8(bytes).map_err(|_| InvalidCursor)?;
        let (micros, post_id) = text.split_once(':').ok_or(InvalidCursor)?;

        let micros = micros.parse::<i64>().map_err(|_| InvalidCursor)?;
        let created_at = Utc
            .timestamp_micros(micros)
            .single()
            .ok_or(InvalidCursor)?;
        let post_id = Uuid::parse_str(post_id).map_err(|_| InvalidCursor)?;

        Ok(Self {
            created_at,
            post_id,
        })
    }
}

// =====================================================================
// Page types
// =====================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub cursor: Option<FeedCursor>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            cursor: None,
        }
    }
}

/// Posts newest-first plus the cursor for the following page
#[derive(Debug, Clone, Default)]
pub struct PostsPage {
    pub posts: Vec<Post>,
    pub next_cursor: Option<FeedCursor>,
}

/// Everything needed to render one feed page, read from one snapshot
#[derive(Debug, Clone, Default)]
pub struct FeedPageRecords {
    pub posts: Vec<Post>,
    /// Post authors keyed by user id
    pub authors: HashMap<Uuid, User>,
    /// Comment threads keyed by post id; posts without comments may be absent
    pub comments: HashMap<Uuid, Vec<CommentEntry>>,
    pub next_cursor: Option<FeedCursor>,
}

/// Trim an over-fetched (`limit + 1`) result down to a page.
pub(crate) fn split_page(mut posts: Vec<Post>, limit: usize) -> PostsPage {
    if posts.len() > limit {
        posts.truncate(limit);
        let next_cursor = posts.last().map(FeedCursor::after);
        PostsPage { posts, next_cursor }
    } else {
        PostsPage {
            posts,
            next_cursor: None,
        }
    }
}

pub(crate) fn distinct_authors(posts: &[Post]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    posts
        .iter()
        .map(|p| p.author_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Persistence contract for posts, users and append-only comment threads.
#[async_trait]
pub trait Store: Send + Sync {
    /// Posts newest-first (`created_at DESC, id DESC`), at most `page.limit`.
    async fn get_posts_page(&self, page: &PageRequest) -> StoreResult<PostsPage>;

    async fn get_post(&self, post_id: Uuid) -> StoreResult<Post>;

    async fn get_author(&self, user_id: Uuid) -> StoreResult<User>;

    /// Batch author lookup; ids without a user record are absent from the map.
    async fn get_authors(&self, user_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, User>>;

    /// One post's thread in insertion order, each comment joined with its author.
    async fn get_comments(&self, post_id: Uuid) -> StoreResult<Vec<CommentEntry>>;

    /// Batch variant of [`Store::get_comments`] for many posts at once.
    async fn get_comments_for_posts(
        &self,
        post_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, Vec<CommentEntry>>>;

    /// Atomically append a comment to the end of its post's thread.
    async fn append_comment(&self, comment: NewComment) -> StoreResult<Comment>;

    /// Posts page with authors and comments in one logical fetch.
    ///
    /// The default composes the batch primitives (three reads, never one per
    /// post). Implementations override it to read from a single snapshot.
    async fn load_feed_page(&self, page: &PageRequest) -> StoreResult<FeedPageRecords> {
        let PostsPage { posts, next_cursor } = self.get_posts_page(page).await?;
        let post_ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();

        let authors = self.get_authors(&distinct_authors(&posts)).await?;
        let comments = self.get_comments_for_posts(&post_ids).await?;

        Ok(FeedPageRecords {
            posts,
            authors,
            comments,
            next_cursor,
        })
    }

    /// Readiness probe
    async fn ping(&self) -> StoreResult<()>;
}
