//! PostgreSQL-backed [`Store`].
//!
//! Appends lock the parent post row (`FOR UPDATE`) so concurrent comments on
//! the same post get distinct, gap-free positions. Multi-query reads run in a
//! `REPEATABLE READ, READ ONLY` transaction so they share one snapshot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use db_pool::{create_pool, DbConfig};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use super::{
    distinct_authors, split_page, FeedPageRecords, PageRequest, PostsPage, Store, StoreError,
    StoreResult,
};
use crate::models::{Comment, CommentEntry, NewComment, Post, User};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

/// Comment row joined with its (possibly missing) author
#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    post_id: Uuid,
    author_id: Uuid,
    text: String,
    created_at: DateTime<Utc>,
    author_username: Option<String>,
}

impl CommentRow {
    fn into_entry(self) -> StoreResult<CommentEntry> {
        let username = self
            .author_username
            .ok_or_else(|| StoreError::user_not_found(self.author_id))?;

        Ok(CommentEntry {
            author: User {
                id: self.author_id,
                username,
            },
            comment: Comment {
                id: self.id,
                post_id: self.post_id,
                author_id: self.author_id,
                text: self.text,
                created_at: self.created_at,
            },
        })
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build the pool through `db-pool` and wrap it.
    pub async fn connect(config: DbConfig) -> Result<Self, sqlx::Error> {
        config.log_config();
        Ok(Self::new(create_pool(config).await?))
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin_snapshot(&self) -> StoreResult<Transaction<'_, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    pub async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query("INSERT INTO users (id, username) VALUES ($1, $2)")
            .bind(user.id)
            .bind(&user.username)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_post(&self, post: &Post) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, author_id, caption, image_ref, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(post.id)
        .bind(post.author_id)
        .bind(&post.caption)
        .bind(&post.image_ref)
        .bind(post.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

async fn fetch_posts_page(conn: &mut PgConnection, page: &PageRequest) -> StoreResult<PostsPage> {
    let (before_ts, before_id) = match page.cursor {
        Some(cursor) => (Some(cursor.created_at), Some(cursor.post_id)),
        None => (None, None),
    };

    let posts = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, author_id, caption, image_ref, created_at
        FROM posts
        WHERE $1::timestamptz IS NULL
           OR (created_at, id) < ($1::timestamptz, $2::uuid)
        ORDER BY created_at DESC, id DESC
        LIMIT $3
        "#,
    )
    .bind(before_ts)
    .bind(before_id)
    .bind((page.limit + 1) as i64)
    .fetch_all(&mut *conn)
    .await?;

    Ok(split_page(posts, page.limit))
}

async fn fetch_authors(
    conn: &mut PgConnection,
    user_ids: &[Uuid],
) -> StoreResult<HashMap<Uuid, User>> {
    if user_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let users = sqlx::query_as::<_, User>("SELECT id, username FROM users WHERE id = ANY($1)")
        .bind(user_ids)
        .fetch_all(&mut *conn)
        .await?;

    Ok(users.into_iter().map(|u| (u.id, u)).collect())
}

async fn fetch_threads(
    conn: &mut PgConnection,
    post_ids: &[Uuid],
) -> StoreResult<HashMap<Uuid, Vec<CommentEntry>>> {
    let mut threads: HashMap<Uuid, Vec<CommentEntry>> =
        post_ids.iter().map(|id| (*id, Vec::new())).collect();
    if post_ids.is_empty() {
        return Ok(threads);
    }

    let rows = sqlx::query_as::<_, CommentRow>(
        r#"
        SELECT c.id, c.post_id, c.author_id, c.text, c.created_at,
               u.username AS author_username
        FROM comments c
        LEFT JOIN users u ON u.id = c.author_id
        WHERE c.post_id = ANY($1)
        ORDER BY c.post_id, c.position ASC
        "#,
    )
    .bind(post_ids)
    .fetch_all(&mut *conn)
    .await?;

    for row in rows {
        let post_id = row.post_id;
        threads.entry(post_id).or_default().push(row.into_entry()?);
    }

    Ok(threads)
}

async fn post_exists(conn: &mut PgConnection, post_id: Uuid) -> StoreResult<bool> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM posts WHERE id = $1)")
        .bind(post_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

#[async_trait]
impl Store for PgStore {
    async fn get_posts_page(&self, page: &PageRequest) -> StoreResult<PostsPage> {
        let mut conn = self.pool.acquire().await?;
        fetch_posts_page(&mut conn, page).await
    }

    async fn get_post(&self, post_id: Uuid) -> StoreResult<Post> {
        sqlx::query_as::<_, Post>(
            "SELECT id, author_id, caption, image_ref, created_at FROM posts WHERE id = $1",
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::post_not_found(post_id))
    }

    async fn get_author(&self, user_id: Uuid) -> StoreResult<User> {
        sqlx::query_as::<_, User>("SELECT id, username FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::user_not_found(user_id))
    }

    async fn get_authors(&self, user_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, User>> {
        let mut conn = self.pool.acquire().await?;
        fetch_authors(&mut conn, user_ids).await
    }

    async fn get_comments(&self, post_id: Uuid) -> StoreResult<Vec<CommentEntry>> {
        let mut tx = self.begin_snapshot().await?;
        if !post_exists(&mut tx, post_id).await? {
            return Err(StoreError::post_not_found(post_id));
        }
        let mut threads = fetch_threads(&mut tx, &[post_id]).await?;
        tx.commit().await?;

        Ok(threads.remove(&post_id).unwrap_or_default())
    }

    async fn get_comments_for_posts(
        &self,
        post_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, Vec<CommentEntry>>> {
        let mut conn = self.pool.acquire().await?;
        fetch_threads(&mut conn, post_ids).await
    }

    async fn append_comment(&self, new: NewComment) -> StoreResult<Comment> {
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query_scalar::<_, Uuid>("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
            .bind(new.post_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(StoreError::post_not_found(new.post_id));
        }

        let author_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                .bind(new.author_id)
                .fetch_one(&mut *tx)
                .await?;
        if !author_exists {
            return Err(StoreError::user_not_found(new.author_id));
        }

        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (id, post_id, author_id, text, position)
            VALUES (
                $1, $2, $3, $4,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM comments WHERE post_id = $2)
            )
            RETURNING id, post_id, author_id, text, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.post_id)
        .bind(new.author_id)
        .bind(&new.text)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(comment_id = %comment.id, post_id = %comment.post_id, "Comment appended");

        Ok(comment)
    }

    async fn load_feed_page(&self, page: &PageRequest) -> StoreResult<FeedPageRecords> {
        let mut tx = self.begin_snapshot().await?;

        let PostsPage { posts, next_cursor } = fetch_posts_page(&mut tx, page).await?;
        let post_ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
        let authors = fetch_authors(&mut tx, &distinct_authors(&posts)).await?;
        let comments = fetch_threads(&mut tx, &post_ids).await?;

        tx.commit().await?;

        Ok(FeedPageRecords {
            posts,
            authors,
            comments,
            next_cursor,
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
