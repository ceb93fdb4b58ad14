//! Process-local [`Store`] used by tests and `FEED_STORE=memory` development runs.
//!
//! All state sits behind one `RwLock`: appends take the write lock, so appends
//! to the same post are serialized, and a feed page is assembled under a single
//! read lock, so it never observes a half-applied append.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use super::{
    distinct_authors, split_page, FeedPageRecords, PageRequest, PostsPage, Store, StoreError,
    StoreResult,
};
use crate::models::{Comment, CommentEntry, NewComment, Post, User};

/// Seed file layout for `FEED_SEED_PATH`
#[derive(Debug, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub posts: Vec<Post>,
}

struct PostRecord {
    post: Post,
    /// Append-only; index is the comment's position in the thread
    comment_ids: Vec<Uuid>,
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    posts: HashMap<Uuid, PostRecord>,
    comments: HashMap<Uuid, Comment>,
    /// Ascending `(created_at, id)`; the feed walks it in reverse
    feed_order: BTreeSet<(DateTime<Utc>, Uuid)>,
}

impl MemoryState {
    fn posts_page(&self, page: &PageRequest) -> PostsPage {
        let upper = match page.cursor {
            Some(cursor) => Bound::Excluded((cursor.created_at, cursor.post_id)),
            None => Bound::Unbounded,
        };

        let posts = self
            .feed_order
            .range((Bound::Unbounded, upper))
            .rev()
            .take(page.limit + 1)
            .filter_map(|(_, id)| self.posts.get(id))
            .map(|record| record.post.clone())
            .collect();

        split_page(posts, page.limit)
    }

    fn user(&self, user_id: Uuid) -> StoreResult<&User> {
        self.users
            .get(&user_id)
            .ok_or_else(|| StoreError::user_not_found(user_id))
    }

    fn authors(&self, user_ids: &[Uuid]) -> HashMap<Uuid, User> {
        user_ids
            .iter()
            .filter_map(|id| self.users.get(id))
            .map(|user| (user.id, user.clone()))
            .collect()
    }

    fn thread(&self, record: &PostRecord) -> StoreResult<Vec<CommentEntry>> {
        record
            .comment_ids
            .iter()
            .map(|id| {
                let comment = self.comments.get(id).ok_or_else(|| {
                    StoreError::Unavailable(format!("comment {id} missing from index"))
                })?;
                let author = self.user(comment.author_id)?.clone();
                Ok(CommentEntry {
                    comment: comment.clone(),
                    author,
                })
            })
            .collect()
    }

    fn threads(&self, post_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<CommentEntry>>> {
        let mut threads = HashMap::with_capacity(post_ids.len());
        for post_id in post_ids {
            if let Some(record) = self.posts.get(post_id) {
                threads.insert(*post_id, self.thread(record)?);
            }
        }
        Ok(threads)
    }
}

/// In-memory [`Store`] implementation
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: SeedData) -> StoreResult<Self> {
        let store = Self::new();
        for user in seed.users {
            store.insert_user(user)?;
        }
        for post in seed.posts {
            store.insert_post(post)?;
        }
        Ok(store)
    }

    /// Load a JSON seed file (`{"users": [...], "posts": [...]}`).
    pub fn from_seed_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        let seed: SeedData = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse seed file {}", path.display()))?;
        Self::from_seed(seed).context("Failed to apply seed data")
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    /// Register a user. Usernames are unique.
    pub fn insert_user(&self, user: User) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("user {} already exists", user.id)));
        }
        if state.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!(
                "username {} already taken",
                user.username
            )));
        }
        state.users.insert(user.id, user);
        Ok(())
    }

    /// Register a post. The author is not checked, mirroring out-of-band writers.
    pub fn insert_post(&self, mut post: Post) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.posts.contains_key(&post.id) {
            return Err(StoreError::Conflict(format!("post {} already exists", post.id)));
        }
        // Cursors carry microseconds
        post.created_at = post.created_at.trunc_subsecs(6);
        state.feed_order.insert((post.created_at, post.id));
        state.posts.insert(
            post.id,
            PostRecord {
                post,
                comment_ids: Vec::new(),
            },
        );
        Ok(())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_posts_page(&self, page: &PageRequest) -> StoreResult<PostsPage> {
        Ok(self.read()?.posts_page(page))
    }

    async fn get_post(&self, post_id: Uuid) -> StoreResult<Post> {
        self.read()?
            .posts
            .get(&post_id)
            .map(|record| record.post.clone())
            .ok_or_else(|| StoreError::post_not_found(post_id))
    }

    async fn get_author(&self, user_id: Uuid) -> StoreResult<User> {
        self.read()?.user(user_id).cloned()
    }

    async fn get_authors(&self, user_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, User>> {
        Ok(self.read()?.authors(user_ids))
    }

    async fn get_comments(&self, post_id: Uuid) -> StoreResult<Vec<CommentEntry>> {
        let state = self.read()?;
        let record = state
            .posts
            .get(&post_id)
            .ok_or_else(|| StoreError::post_not_found(post_id))?;
        state.thread(record)
    }

    async fn get_comments_for_posts(
        &self,
        post_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, Vec<CommentEntry>>> {
        self.read()?.threads(post_ids)
    }

    async fn append_comment(&self, new: NewComment) -> StoreResult<Comment> {
        let mut guard = self.write()?;
        let state = &mut *guard;

        if !state.users.contains_key(&new.author_id) {
            return Err(StoreError::user_not_found(new.author_id));
        }
        let record = state
            .posts
            .get_mut(&new.post_id)
            .ok_or_else(|| StoreError::post_not_found(new.post_id))?;

        // Keep thread timestamps non-decreasing even if the wall clock steps back
        let mut created_at = Utc::now().trunc_subsecs(6);
        if let Some(last) = record
            .comment_ids
            .last()
            .and_then(|id| state.comments.get(id))
        {
            created_at = created_at.max(last.created_at);
        }

        let comment = Comment {
            id: Uuid::new_v4(),
            post_id: new.post_id,
            author_id: new.author_id,
            text: new.text,
            created_at,
        };
        record.comment_ids.push(comment.id);
        state.comments.insert(comment.id, comment.clone());

        Ok(comment)
    }

    async fn load_feed_page(&self, page: &PageRequest) -> StoreResult<FeedPageRecords> {
        let state = self.read()?;
        let PostsPage { posts, next_cursor } = state.posts_page(page);
        let post_ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();

        let authors = state.authors(&distinct_authors(&posts));
        let comments = state.threads(&post_ids)?;

        Ok(FeedPageRecords {
            posts,
            authors,
            comments,
            next_cursor,
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        self.read().map(|_| ())
    }
}
