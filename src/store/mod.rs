pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::domain::{
    Feed, FeedFollow, FeedWithOwner, FollowedFeed, NewFeed, NewPost, Post, User,
};

pub use sqlite::SqliteStore;

/// Persistence for users, feeds, follows and posts.
///
/// Unique-key violations surface as [`GatorError::AlreadyExists`], except for
/// `posts.url` which surfaces as [`GatorError::DuplicatePost`] so ingestion
/// can treat it as a no-op.
///
/// [`GatorError::AlreadyExists`]: crate::app::GatorError::AlreadyExists
/// [`GatorError::DuplicatePost`]: crate::app::GatorError::DuplicatePost
pub trait Store {
    // User operations
    fn create_user(&self, name: &str) -> Result<User>;
    fn get_user_by_name(&self, name: &str) -> Result<Option<User>>;
    fn list_users(&self) -> Result<Vec<User>>;
    /// Deletes every user; feeds, follows and posts go with them.
    fn delete_all_users(&self) -> Result<usize>;

    // Feed operations
    fn create_feed(&self, feed: &NewFeed) -> Result<Feed>;
    fn get_feed(&self, id: i64) -> Result<Option<Feed>>;
    fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>>;
    fn list_feeds(&self) -> Result<Vec<FeedWithOwner>>;

    // Follow operations
    fn create_follow(&self, user_id: i64, feed_id: i64) -> Result<FeedFollow>;
    /// Returns whether a follow was removed.
    fn delete_follow(&self, feed_id: i64, user_id: i64) -> Result<bool>;
    fn list_follows_for_user(&self, user_id: i64) -> Result<Vec<FollowedFeed>>;

    // Ingestion bookkeeping
    /// Never-fetched feeds first, then oldest `last_fetched_at`; feeds still
    /// backing off at `now` are skipped.
    fn select_next_feed_to_fetch(&self, now: DateTime<Utc>) -> Result<Option<Feed>>;
    fn mark_feed_fetched(&self, feed_id: i64, at: DateTime<Utc>) -> Result<()>;
    fn record_fetch_success(&self, feed_id: i64) -> Result<()>;
    fn record_fetch_failure(
        &self,
        feed_id: i64,
        error: &str,
        retry_after: DateTime<Utc>,
    ) -> Result<u32>;

    // Post operations
    fn create_post(&self, post: &NewPost) -> Result<Post>;
    fn get_post_by_url(&self, url: &str) -> Result<Option<Post>>;
    /// Most recent posts across the feeds `user_id` follows.
    fn list_posts_for_user(&self, user_id: i64, limit: u32) -> Result<Vec<Post>>;
}
