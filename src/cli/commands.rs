use std::time::Duration;

use crate::app::{AppContext, GatorError, Result, Session};
use crate::domain::{NewFeed, User};
use crate::scheduler::{self, FeedScheduler};
use crate::store::Store;

pub fn register(ctx: &AppContext, session: &mut Session, username: &str) -> Result<()> {
    if ctx.store.get_user_by_name(username)?.is_some() {
        return Err(GatorError::AlreadyExists(format!("user {}", username)));
    }

    let user = ctx.store.create_user(username)?;
    session.set_user(user.name.clone());
    tracing::debug!(user_id = user.id, "registered user");

    println!("User {} has been registered", user.name);
    Ok(())
}

pub fn login(ctx: &AppContext, session: &mut Session, username: &str) -> Result<()> {
    let user = ctx
        .store
        .get_user_by_name(username)?
        .ok_or_else(|| GatorError::NotFound(format!("user {}", username)))?;

    session.set_user(user.name.clone());
    println!("Logged in as {}", user.name);
    Ok(())
}

pub fn reset(ctx: &AppContext) -> Result<()> {
    let deleted = ctx.store.delete_all_users()?;
    tracing::info!(deleted, "reset users");

    println!("Deleted {} users and their feeds", deleted);
    Ok(())
}

pub fn list_users(ctx: &AppContext, session: &Session) -> Result<()> {
    let users = ctx.store.list_users()?;

    if users.is_empty() {
        println!("No users");
        return Ok(());
    }

    for user in users {
        if session.is_current(&user.name) {
            println!("* {} (current)", user.name);
        } else {
            println!("* {}", user.name);
        }
    }

    Ok(())
}

pub async fn agg(ctx: &AppContext, interval: Duration) -> Result<()> {
    let mut scheduler = FeedScheduler::new(ctx.pipeline(), interval)?;

    println!(
        "Collecting feeds every {} (Ctrl-C to stop)",
        scheduler::format_interval(scheduler.interval())
    );

    let report = scheduler.run(scheduler::shutdown_signal()).await;

    println!(
        "Stopped after {} ticks: {} new posts, {} failed ticks",
        report.ticks, report.posts_inserted, report.failures
    );
    Ok(())
}

pub fn add_feed(ctx: &AppContext, user: &User, name: &str, url: &str) -> Result<()> {
    let feed = ctx.store.create_feed(&NewFeed::new(name, url, user.id))?;
    println!("Added feed {} ({})", feed.name, feed.url);

    // The creator follows the feed; a failure here is reported, the feed stays.
    ctx.store.create_follow(user.id, feed.id)?;
    println!("{} is now following {}", user.name, feed.name);

    Ok(())
}

pub fn list_feeds(ctx: &AppContext) -> Result<()> {
    let feeds = ctx.store.list_feeds()?;

    if feeds.is_empty() {
        println!("No feeds");
        return Ok(());
    }

    for entry in feeds {
        let fetched = entry
            .feed
            .last_fetched_at
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{}\n  {}\n  added by {}, last fetched {}",
            entry.feed.name, entry.feed.url, entry.owner_name, fetched
        );
        if let Some(error) = &entry.feed.last_error {
            println!(
                "  last error: {} ({} consecutive failures)",
                error, entry.feed.consecutive_failures
            );
        }
    }

    Ok(())
}

pub fn follow(ctx: &AppContext, user: &User, url: &str) -> Result<()> {
    let feed = ctx
        .store
        .get_feed_by_url(url)?
        .ok_or_else(|| GatorError::NotFound(format!("feed {}", url)))?;

    ctx.store.create_follow(user.id, feed.id)?;
    println!("{} is now following {}", user.name, feed.name);
    Ok(())
}

pub fn unfollow(ctx: &AppContext, user: &User, url: &str) -> Result<()> {
    let feed = ctx
        .store
        .get_feed_by_url(url)?
        .ok_or_else(|| GatorError::NotFound(format!("feed {}", url)))?;

    if !ctx.store.delete_follow(feed.id, user.id)? {
        return Err(GatorError::NotFound(format!(
            "{} is not following {}",
            user.name, feed.url
        )));
    }

    println!("{} unfollowed {}", user.name, feed.name);
    Ok(())
}

pub fn following(ctx: &AppContext, user: &User) -> Result<()> {
    let follows = ctx.store.list_follows_for_user(user.id)?;

    if follows.is_empty() {
        println!("{} is not following any feeds", user.name);
        return Ok(());
    }

    for follow in follows {
        println!("* {} ({})", follow.feed_name, follow.feed_url);
    }

    Ok(())
}

pub fn browse(ctx: &AppContext, user: &User, limit: u32) -> Result<()> {
    let posts = ctx.store.list_posts_for_user(user.id, limit)?;

    if posts.is_empty() {
        println!("No posts");
        return Ok(());
    }

    for post in posts {
        let date = post
            .published_at
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "          ".to_string());

        println!("{} {}\n  {}", date, post.display_title(), post.url);
        let description = post.display_description();
        if !description.is_empty() {
            println!("  {}", description);
        }
    }

    Ok(())
}
