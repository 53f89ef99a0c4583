//! Integration tests for ingestion: fairness, idempotence and browse order.

mod common;

use std::collections::HashSet;

use chrono::Utc;

use common::{args, day, document, item, test_ctx};
use gator::app::Session;
use gator::cli::router;
use gator::domain::NewPost;
use gator::ingest::{save_post, TickOutcome};
use gator::store::Store;

async fn alice_with_feed(ctx: &gator::app::AppContext, url: &str) -> Session {
    let mut session = Session::anonymous();
    router::run(ctx, &mut session, "register", &args(&["alice"]))
        .await
        .unwrap();
    router::run(ctx, &mut session, "addfeed", &args(&["Feed", url]))
        .await
        .unwrap();
    session
}

#[tokio::test]
async fn test_browse_returns_most_recent_posts_first() {
    let (ctx, fetcher) = test_ctx();
    let url = "https://example.com/rss";
    alice_with_feed(&ctx, url).await;

    fetcher.serve(
        url,
        document(vec![
            item("https://example.com/jan-1", "Jan 1", Some(day(1))),
            item("https://example.com/jan-3", "Jan 3", Some(day(3))),
            item("https://example.com/jan-2", "Jan 2", Some(day(2))),
        ]),
    );
    ctx.pipeline().tick().await.unwrap();

    let alice = ctx.store.get_user_by_name("alice").unwrap().unwrap();
    let posts = ctx.store.list_posts_for_user(alice.id, 2).unwrap();
    let dates: Vec<_> = posts.iter().map(|p| p.published_at).collect();
    assert_eq!(dates, vec![Some(day(3)), Some(day(2))]);
}

#[tokio::test]
async fn test_reingesting_document_creates_no_duplicates() {
    let (ctx, fetcher) = test_ctx();
    let url = "https://example.com/rss";
    alice_with_feed(&ctx, url).await;

    fetcher.serve(
        url,
        document(vec![
            item("https://example.com/a", "A", Some(day(1))),
            item("https://example.com/b", "B", Some(day(2))),
        ]),
    );

    let pipeline = ctx.pipeline();
    pipeline.tick().await.unwrap();
    let TickOutcome::Fetched(second) = pipeline.tick().await.unwrap() else {
        panic!("feed should be selected again");
    };
    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 2);

    let alice = ctx.store.get_user_by_name("alice").unwrap().unwrap();
    let urls: HashSet<String> = ctx
        .store
        .list_posts_for_user(alice.id, 100)
        .unwrap()
        .into_iter()
        .map(|p| p.url)
        .collect();
    assert_eq!(urls.len(), 2);
}

#[tokio::test]
async fn test_same_post_url_from_two_feeds_is_stored_once() {
    let (ctx, fetcher) = test_ctx();
    let mut session = alice_with_feed(&ctx, "https://one.example.com/rss").await;
    router::run(
        &ctx,
        &mut session,
        "addfeed",
        &args(&["Two", "https://two.example.com/rss"]),
    )
    .await
    .unwrap();

    let shared = item("https://shared.example.com/post", "Shared", Some(day(1)));
    fetcher.serve("https://one.example.com/rss", document(vec![shared.clone()]));
    fetcher.serve("https://two.example.com/rss", document(vec![shared]));

    let pipeline = ctx.pipeline();
    pipeline.tick().await.unwrap();
    pipeline.tick().await.unwrap();

    let post = ctx
        .store
        .get_post_by_url("https://shared.example.com/post")
        .unwrap()
        .unwrap();
    let first_feed = ctx
        .store
        .get_feed_by_url("https://one.example.com/rss")
        .unwrap()
        .unwrap();
    assert_eq!(post.feed_id, first_feed.id);
}

#[tokio::test]
async fn test_new_feed_is_polled_before_previously_fetched_ones() {
    let (ctx, fetcher) = test_ctx();
    let mut session = alice_with_feed(&ctx, "https://old.example.com/rss").await;
    fetcher.serve("https://old.example.com/rss", document(vec![]));
    fetcher.serve("https://new.example.com/rss", document(vec![]));

    let pipeline = ctx.pipeline();
    pipeline.tick().await.unwrap();

    router::run(
        &ctx,
        &mut session,
        "addfeed",
        &args(&["New", "https://new.example.com/rss"]),
    )
    .await
    .unwrap();

    let TickOutcome::Fetched(report) = pipeline.tick().await.unwrap() else {
        panic!("expected a fetched tick");
    };
    assert_eq!(report.feed_url, "https://new.example.com/rss");
}

#[tokio::test]
async fn test_failed_fetch_is_marked_and_backs_off() {
    let (ctx, _fetcher) = test_ctx();
    let url = "https://missing.example.com/rss";
    alice_with_feed(&ctx, url).await;

    let pipeline = ctx.pipeline();
    assert!(pipeline.tick().await.is_err());

    let feed = ctx.store.get_feed_by_url(url).unwrap().unwrap();
    assert!(feed.last_fetched_at.is_some());
    assert_eq!(feed.consecutive_failures, 1);
    assert!(feed.is_backing_off(Utc::now()));

    // Nothing else is eligible while the only feed backs off.
    assert_eq!(pipeline.tick().await.unwrap(), TickOutcome::Idle);
}

#[tokio::test]
async fn test_save_post_tolerates_existing_url() {
    let (ctx, _) = test_ctx();
    let url = "https://example.com/rss";
    alice_with_feed(&ctx, url).await;
    let feed = ctx.store.get_feed_by_url(url).unwrap().unwrap();

    let post = NewPost {
        feed_id: feed.id,
        title: "First".to_string(),
        url: "https://example.com/p".to_string(),
        description: None,
        published_at: Some(day(1)),
    };
    assert!(save_post(ctx.store.as_ref(), &post).unwrap());

    let again = NewPost {
        title: "Second".to_string(),
        ..post
    };
    assert!(!save_post(ctx.store.as_ref(), &again).unwrap());

    let stored = ctx
        .store
        .get_post_by_url("https://example.com/p")
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "First");
}
