use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{GatorError, Result};
use crate::config::DbLocation;
use crate::domain::{
    Feed, FeedFollow, FeedWithOwner, FollowedFeed, NewFeed, NewPost, Post, User,
};
use crate::store::Store;

const FEED_COLUMNS: &str = "f.id, f.name, f.url, f.user_id, f.last_fetched_at, \
     f.consecutive_failures, f.last_error, f.retry_after, f.created_at";

const POST_COLUMNS: &str =
    "p.id, p.feed_id, p.title, p.url, p.description, p.published_at, p.created_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn open(location: &DbLocation) -> Result<Self> {
        match location {
            DbLocation::Memory => Self::in_memory(),
            DbLocation::File(path) => Self::new(path),
        }
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        migrations.to_latest(&mut conn)?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            GatorError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    /// Fixed-width UTC text so that SQL string ordering is chronological.
    fn format_datetime(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
        Ok(row
            .get::<_, String>(idx)
            .ok()
            .and_then(|s| Self::parse_datetime(&s))
            .unwrap_or_else(Utc::now))
    }

    fn optional_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
        Ok(row
            .get::<_, Option<String>>(idx)?
            .and_then(|s| Self::parse_datetime(&s)))
    }

    fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: Self::timestamp(row, 2)?,
        })
    }

    fn feed_from_row(row: &Row<'_>) -> rusqlite::Result<Feed> {
        Ok(Feed {
            id: row.get(0)?,
            name: row.get(1)?,
            url: row.get(2)?,
            user_id: row.get(3)?,
            last_fetched_at: Self::optional_timestamp(row, 4)?,
            consecutive_failures: row.get(5)?,
            last_error: row.get(6)?,
            retry_after: Self::optional_timestamp(row, 7)?,
            created_at: Self::timestamp(row, 8)?,
        })
    }

    fn follow_from_row(row: &Row<'_>) -> rusqlite::Result<FeedFollow> {
        Ok(FeedFollow {
            id: row.get(0)?,
            user_id: row.get(1)?,
            feed_id: row.get(2)?,
            created_at: Self::timestamp(row, 3)?,
        })
    }

    fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
        Ok(Post {
            id: row.get(0)?,
            feed_id: row.get(1)?,
            title: row.get(2)?,
            url: row.get(3)?,
            description: row.get(4)?,
            published_at: Self::optional_timestamp(row, 5)?,
            created_at: Self::timestamp(row, 6)?,
        })
    }

    fn query_feed(
        conn: &Connection,
        filter: &str,
        value: &dyn rusqlite::ToSql,
    ) -> Result<Option<Feed>> {
        let sql = format!("SELECT {FEED_COLUMNS} FROM feeds f WHERE {filter}");
        Ok(conn
            .query_row(&sql, params![value], Self::feed_from_row)
            .optional()?)
    }

    fn query_post(
        conn: &Connection,
        filter: &str,
        value: &dyn rusqlite::ToSql,
    ) -> Result<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts p WHERE {filter}");
        Ok(conn
            .query_row(&sql, params![value], Self::post_from_row)
            .optional()?)
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Map a unique-key violation to `on_conflict`, passing other errors through.
fn classify(err: rusqlite::Error, on_conflict: impl FnOnce() -> GatorError) -> GatorError {
    if is_unique_violation(&err) {
        on_conflict()
    } else {
        GatorError::Database(err)
    }
}

impl Store for SqliteStore {
    fn create_user(&self, name: &str) -> Result<User> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO users (name, created_at) VALUES (?1, ?2)",
            params![name, Self::format_datetime(&Utc::now())],
        )
        .map_err(|e| classify(e, || GatorError::AlreadyExists(format!("user {name}"))))?;

        let id = conn.last_insert_rowid();
        Ok(conn.query_row(
            "SELECT id, name, created_at FROM users WHERE id = ?1",
            params![id],
            Self::user_from_row,
        )?)
    }

    fn get_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                "SELECT id, name, created_at FROM users WHERE name = ?1",
                params![name],
                Self::user_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare("SELECT id, name, created_at FROM users ORDER BY name")?;
        let users = stmt
            .query_map([], Self::user_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(users)
    }

    fn delete_all_users(&self) -> Result<usize> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM users", [])?)
    }

    fn create_feed(&self, feed: &NewFeed) -> Result<Feed> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO feeds (name, url, user_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                feed.name,
                feed.url,
                feed.user_id,
                Self::format_datetime(&Utc::now())
            ],
        )
        .map_err(|e| classify(e, || GatorError::AlreadyExists(format!("feed {}", feed.url))))?;

        let id = conn.last_insert_rowid();
        Self::query_feed(&conn, "f.id = ?1", &id)?
            .ok_or_else(|| GatorError::NotFound(format!("feed {id}")))
    }

    fn get_feed(&self, id: i64) -> Result<Option<Feed>> {
        let conn = self.conn()?;
        Self::query_feed(&conn, "f.id = ?1", &id)
    }

    fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let conn = self.conn()?;
        Self::query_feed(&conn, "f.url = ?1", &url)
    }

    fn list_feeds(&self) -> Result<Vec<FeedWithOwner>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {FEED_COLUMNS}, u.name FROM feeds f
             JOIN users u ON u.id = f.user_id
             ORDER BY f.name, f.url"
        ))?;

        let feeds = stmt
            .query_map([], |row| {
                Ok(FeedWithOwner {
                    feed: Self::feed_from_row(row)?,
                    owner_name: row.get(9)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(feeds)
    }

    fn create_follow(&self, user_id: i64, feed_id: i64) -> Result<FeedFollow> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO feed_follows (user_id, feed_id, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, feed_id, Self::format_datetime(&Utc::now())],
        )
        .map_err(|e| {
            classify(e, || {
                GatorError::AlreadyExists(format!("follow of feed {feed_id} by user {user_id}"))
            })
        })?;

        let id = conn.last_insert_rowid();
        Ok(conn.query_row(
            "SELECT id, user_id, feed_id, created_at FROM feed_follows WHERE id = ?1",
            params![id],
            Self::follow_from_row,
        )?)
    }

    fn delete_follow(&self, feed_id: i64, user_id: i64) -> Result<bool> {
        let conn = self.conn()?;

        let deleted = conn.execute(
            "DELETE FROM feed_follows WHERE feed_id = ?1 AND user_id = ?2",
            params![feed_id, user_id],
        )?;

        Ok(deleted > 0)
    }

    fn list_follows_for_user(&self, user_id: i64) -> Result<Vec<FollowedFeed>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT ff.id, ff.user_id, ff.feed_id, ff.created_at, f.name, f.url
             FROM feed_follows ff
             JOIN feeds f ON f.id = ff.feed_id
             WHERE ff.user_id = ?1
             ORDER BY ff.created_at, ff.id",
        )?;

        let follows = stmt
            .query_map(params![user_id], |row| {
                Ok(FollowedFeed {
                    follow: Self::follow_from_row(row)?,
                    feed_name: row.get(4)?,
                    feed_url: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(follows)
    }

    fn select_next_feed_to_fetch(&self, now: DateTime<Utc>) -> Result<Option<Feed>> {
        let conn = self.conn()?;

        let sql = format!(
            "SELECT {FEED_COLUMNS} FROM feeds f
             WHERE f.retry_after IS NULL OR f.retry_after <= ?1
             ORDER BY f.last_fetched_at IS NOT NULL, f.last_fetched_at ASC, f.id ASC
             LIMIT 1"
        );

        let result = conn
            .query_row(&sql, params![Self::format_datetime(&now)], Self::feed_from_row)
            .optional()?;

        Ok(result)
    }

    fn mark_feed_fetched(&self, feed_id: i64, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn()?;

        let updated = conn.execute(
            "UPDATE feeds SET last_fetched_at = ?1 WHERE id = ?2",
            params![Self::format_datetime(&at), feed_id],
        )?;

        if updated == 0 {
            return Err(GatorError::NotFound(format!("feed {feed_id}")));
        }
        Ok(())
    }

    fn record_fetch_success(&self, feed_id: i64) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "UPDATE feeds SET consecutive_failures = 0, last_error = NULL, retry_after = NULL
             WHERE id = ?1",
            params![feed_id],
        )?;

        Ok(())
    }

    fn record_fetch_failure(
        &self,
        feed_id: i64,
        error: &str,
        retry_after: DateTime<Utc>,
    ) -> Result<u32> {
        let conn = self.conn()?;

        let updated = conn.execute(
            "UPDATE feeds
             SET consecutive_failures = consecutive_failures + 1, last_error = ?1, retry_after = ?2
             WHERE id = ?3",
            params![error, Self::format_datetime(&retry_after), feed_id],
        )?;

        if updated == 0 {
            return Err(GatorError::NotFound(format!("feed {feed_id}")));
        }

        let failures: u32 = conn.query_row(
            "SELECT consecutive_failures FROM feeds WHERE id = ?1",
            params![feed_id],
            |row| row.get(0),
        )?;

        Ok(failures)
    }

    fn create_post(&self, post: &NewPost) -> Result<Post> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO posts (feed_id, title, url, description, published_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                post.feed_id,
                post.title,
                post.url,
                post.description,
                post.published_at.as_ref().map(Self::format_datetime),
                Self::format_datetime(&Utc::now())
            ],
        )
        .map_err(|e| classify(e, || GatorError::DuplicatePost(post.url.clone())))?;

        let id = conn.last_insert_rowid();
        Self::query_post(&conn, "p.id = ?1", &id)?
            .ok_or_else(|| GatorError::NotFound(format!("post {id}")))
    }

    fn get_post_by_url(&self, url: &str) -> Result<Option<Post>> {
        let conn = self.conn()?;
        Self::query_post(&conn, "p.url = ?1", &url)
    }

    fn list_posts_for_user(&self, user_id: i64, limit: u32) -> Result<Vec<Post>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts p
             JOIN feed_follows ff ON ff.feed_id = p.feed_id
             WHERE ff.user_id = ?1
             ORDER BY p.published_at IS NULL, p.published_at DESC, p.created_at DESC, p.id DESC
             LIMIT ?2"
        ))?;

        let posts = stmt
            .query_map(params![user_id, limit], Self::post_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(posts)
    }
}
