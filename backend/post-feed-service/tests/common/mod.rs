//! Shared fixtures for post-feed-service integration tests.
#![allow(dead_code)]

use actix_middleware::Claims;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use post_feed_service::config::FeedConfig;
use post_feed_service::db::{
    FeedPageRecords, InMemoryStore, PageRequest, PostsPage, Store, StoreError, StoreResult,
};
use post_feed_service::models::{Comment, CommentEntry, NewComment, Post, User};

pub const TEST_JWT_SECRET: &str = "test-secret-for-post-feed-service-0123";

/// Wraps an [`InMemoryStore`], counting calls and optionally failing every
/// operation with `StoreError::Unavailable`.
pub struct RecordingStore {
    inner: InMemoryStore,
    pub append_calls: AtomicUsize,
    pub feed_loads: AtomicUsize,
    pub per_post_reads: AtomicUsize,
    unavailable: AtomicBool,
}

impl RecordingStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            append_calls: AtomicUsize::new(0),
            feed_loads: AtomicUsize::new(0),
            per_post_reads: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    pub fn appends(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for RecordingStore {
    async fn get_posts_page(&self, page: &PageRequest) -> StoreResult<PostsPage> {
        self.check()?;
        self.inner.get_posts_page(page).await
    }

    async fn get_post(&self, post_id: Uuid) -> StoreResult<Post> {
        self.check()?;
        self.inner.get_post(post_id).await
    }

    async fn get_author(&self, user_id: Uuid) -> StoreResult<User> {
        self.check()?;
        self.inner.get_author(user_id).await
    }

    async fn get_authors(&self, user_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, User>> {
        self.check()?;
        self.inner.get_authors(user_ids).await
    }

    async fn get_comments(&self, post_id: Uuid) -> StoreResult<Vec<CommentEntry>> {
        self.check()?;
        self.per_post_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_comments(post_id).await
    }

    async fn get_comments_for_posts(
        &self,
        post_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, Vec<CommentEntry>>> {
        self.check()?;
        self.inner.get_comments_for_posts(post_ids).await
    }

    async fn append_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.append_comment(comment).await
    }

    async fn load_feed_page(&self, page: &PageRequest) -> StoreResult<FeedPageRecords> {
        self.feed_loads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.load_feed_page(page).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check()
    }
}

/// Seeded fixture: users `u1`/`u2`, posts `p1` (by u1, newest) and `p2` (by u2)
pub struct Fixture {
    pub store: Arc<RecordingStore>,
    pub u1: User,
    pub u2: User,
    pub p1: Post,
    pub p2: Post,
}

pub fn user(username: &str) -> User {
    User {
        id: Uuid::new_v4(),
        username: username.to_string(),
    }
}

pub fn post_by(author: &User, minutes_ago: i64) -> Post {
    Post {
        id: Uuid::new_v4(),
        author_id: author.id,
        caption: format!("posted {minutes_ago}m ago"),
        image_ref: format!("https://img.example/{}.jpg", Uuid::new_v4()),
        created_at: Utc::now() - Duration::minutes(minutes_ago),
    }
}

pub fn seeded() -> Fixture {
    let inner = InMemoryStore::new();
    let u1 = user("u1");
    let u2 = user("u2");
    let p1 = post_by(&u1, 1);
    let p2 = post_by(&u2, 5);

    inner.insert_user(u1.clone()).unwrap();
    inner.insert_user(u2.clone()).unwrap();
    inner.insert_post(p1.clone()).unwrap();
    inner.insert_post(p2.clone()).unwrap();

    Fixture {
        store: Arc::new(RecordingStore::new(inner)),
        u1,
        u2,
        p1,
        p2,
    }
}

/// Store with `count` posts by one author, one minute apart
pub fn seeded_with_posts(count: i64) -> (Arc<RecordingStore>, User, Vec<Post>) {
    let inner = InMemoryStore::new();
    let author = user("poster");
    inner.insert_user(author.clone()).unwrap();
    let posts: Vec<Post> = (0..count).map(|i| post_by(&author, i)).collect();
    for post in &posts {
        inner.insert_post(post.clone()).unwrap();
    }
    (Arc::new(RecordingStore::new(inner)), author, posts)
}

pub fn feed_config() -> FeedConfig {
    FeedConfig::default()
}

/// HS256 token for `user_id`, valid for an hour
pub fn mint_token(user_id: Uuid) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + 3600,
        iat: now,
        username: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn expired_token(user_id: Uuid) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now - 3600,
        iat: now - 7200,
        username: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .unwrap()
}
