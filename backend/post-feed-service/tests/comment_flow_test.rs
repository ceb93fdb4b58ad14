//! Service-level tests for comment posting and feed paging over the in-memory store.

mod common;

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use uuid::Uuid;

use common::{feed_config, seeded, seeded_with_posts};
use post_feed_service::db::Store;
use post_feed_service::services::{CommentService, FeedService};
use post_feed_service::AppError;

#[tokio::test]
async fn comment_on_seeded_post_is_visible() {
    let fx = seeded();
    let comments = CommentService::new(fx.store.clone(), &feed_config());

    let entry = comments
        .post_comment(fx.p1.id, fx.u2.id, "nice pic")
        .await
        .unwrap();

    assert_eq!(entry.comment.text, "nice pic");
    assert_eq!(entry.comment.author_id, fx.u2.id);
    assert_eq!(entry.comment.post_id, fx.p1.id);
    assert_eq!(entry.author, fx.u2);

    let thread = fx.store.get_comments(fx.p1.id).await.unwrap();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread.last().unwrap().comment.id, entry.comment.id);
}

#[tokio::test]
async fn new_comment_goes_last() {
    let fx = seeded();
    let comments = CommentService::new(fx.store.clone(), &feed_config());

    comments.post_comment(fx.p1.id, fx.u1.id, "first").await.unwrap();
    comments.post_comment(fx.p1.id, fx.u2.id, "second").await.unwrap();
    let latest = comments.post_comment(fx.p1.id, fx.u1.id, "third").await.unwrap();

    let thread = comments.list_comments(fx.p1.id).await.unwrap();
    let texts: Vec<&str> = thread.iter().map(|e| e.comment.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
    assert_eq!(thread.last().unwrap().comment.id, latest.comment.id);
}

#[tokio::test]
async fn surrounding_whitespace_is_trimmed() {
    let fx = seeded();
    let comments = CommentService::new(fx.store.clone(), &feed_config());

    let entry = comments
        .post_comment(fx.p1.id, fx.u2.id, "  nice pic\n")
        .await
        .unwrap();
    assert_eq!(entry.comment.text, "nice pic");
}

#[tokio::test]
async fn whitespace_only_text_is_rejected_without_writing() {
    let fx = seeded();
    let comments = CommentService::new(fx.store.clone(), &feed_config());

    for text in ["", "   ", "\n\t"] {
        let err = comments
            .post_comment(fx.p1.id, fx.u2.id, text)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    assert_eq!(fx.store.appends(), 0);
    assert!(fx.store.get_comments(fx.p1.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn overlong_text_is_rejected() {
    let fx = seeded();
    let config = feed_config();
    let comments = CommentService::new(fx.store.clone(), &config);

    let text = "a".repeat(config.comment_max_length + 1);
    let err = comments
        .post_comment(fx.p1.id, fx.u2.id, &text)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(fx.store.appends(), 0);
}

#[tokio::test]
async fn unknown_post_is_not_found_and_never_appended() {
    let fx = seeded();
    let comments = CommentService::new(fx.store.clone(), &feed_config());

    let err = comments
        .post_comment(Uuid::new_v4(), fx.u2.id, "hello?")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(fx.store.appends(), 0);
}

#[tokio::test]
async fn caller_without_user_record_is_unauthorized() {
    let fx = seeded();
    let comments = CommentService::new(fx.store.clone(), &feed_config());

    let err = comments
        .post_comment(fx.p1.id, Uuid::new_v4(), "who am i")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Unauthorized(_)));
    assert_eq!(fx.store.appends(), 0);
}

#[tokio::test]
async fn storage_failure_on_append_is_surfaced() {
    let fx = seeded();
    let comments = CommentService::new(fx.store.clone(), &feed_config());
    fx.store.set_unavailable(true);

    let err = comments
        .post_comment(fx.p1.id, fx.u2.id, "lost?")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Storage(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_comments_on_one_post_are_all_kept() {
    const WRITERS: usize = 50;
    let fx = seeded();
    let comments = Arc::new(CommentService::new(fx.store.clone(), &feed_config()));

    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let comments = Arc::clone(&comments);
            let (post_id, author_id) = (fx.p1.id, fx.u2.id);
            tokio::spawn(async move {
                comments
                    .post_comment(post_id, author_id, &format!("comment {i}"))
                    .await
            })
        })
        .collect();

    let mut created = HashSet::new();
    for result in futures::future::join_all(handles).await {
        let entry = result.unwrap().unwrap();
        created.insert(entry.comment.id);
    }

    let thread = fx.store.get_comments(fx.p1.id).await.unwrap();
    assert_eq!(thread.len(), WRITERS);
    let stored: HashSet<Uuid> = thread.iter().map(|e| e.comment.id).collect();
    assert_eq!(stored, created);
    assert!(thread
        .windows(2)
        .all(|w| w[0].comment.created_at <= w[1].comment.created_at));
}

#[tokio::test]
async fn paging_visits_every_post_exactly_once() {
    let (store, _author, posts) = seeded_with_posts(23);
    let feed = FeedService::new(store.clone(), &feed_config());

    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = feed.list_feed(cursor.as_deref(), Some(5)).await.unwrap();
        assert!(page.items.len() <= 5);
        seen.extend(page.items.iter().map(|item| item.post.id));
        match page.next_cursor {
            Some(next) => cursor = Some(next.encode()),
            None => break,
        }
    }

    assert_eq!(seen.len(), posts.len());
    let unique: HashSet<Uuid> = seen.iter().copied().collect();
    assert_eq!(unique.len(), posts.len());
    // Posts were created one minute apart, newest first is seeding order
    let expected: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn feed_never_exceeds_limit() {
    let (store, _author, _posts) = seeded_with_posts(30);
    let feed = FeedService::new(store.clone(), &feed_config());

    assert!(matches!(
        feed.list_feed(None, Some(0)).await,
        Err(AppError::Validation(_))
    ));
    assert_eq!(store.feed_loads.load(Ordering::SeqCst), 0);

    assert_eq!(feed.list_feed(None, None).await.unwrap().items.len(), 20);
    assert_eq!(feed.list_feed(None, Some(1)).await.unwrap().items.len(), 1);
    assert_eq!(feed.list_feed(None, Some(3)).await.unwrap().items.len(), 3);
    assert_eq!(feed.list_feed(None, Some(500)).await.unwrap().items.len(), 30);
}

#[tokio::test]
async fn feed_page_is_one_store_round_trip() {
    let fx = seeded();
    let comments = CommentService::new(fx.store.clone(), &feed_config());
    comments.post_comment(fx.p1.id, fx.u2.id, "nice pic").await.unwrap();
    comments.post_comment(fx.p2.id, fx.u1.id, "great").await.unwrap();

    let feed = FeedService::new(fx.store.clone(), &feed_config());
    let page = feed.list_feed(None, None).await.unwrap();

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].post.id, fx.p1.id);
    assert_eq!(page.items[0].author, fx.u1);
    assert_eq!(page.items[0].comments[0].author, fx.u2);
    assert_eq!(page.items[1].comments[0].comment.text, "great");

    assert_eq!(fx.store.feed_loads.load(Ordering::SeqCst), 1);
    assert_eq!(fx.store.per_post_reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn feed_storage_failure_is_storage_error() {
    let fx = seeded();
    let feed = FeedService::new(fx.store.clone(), &feed_config());
    fx.store.set_unavailable(true);

    let err = feed.list_feed(None, None).await.unwrap_err();
    assert!(matches!(err, AppError::Storage(_)));
}
