//! One polling tick: pick a feed, fetch it, store its posts.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::app::{GatorError, Result};
use crate::domain::{Feed, NewPost};
use crate::fetcher::FeedFetcher;
use crate::parser::FeedItem;
use crate::store::Store;

/// Upper bound on any backoff delay, whatever the configured maximum.
///
/// Keeps `retry_after` inside four-digit years so stored timestamps still
/// compare correctly as text.
pub const MAX_BACKOFF: Duration = Duration::from_secs(100 * 365 * 86_400);

/// Exponential delay applied to a feed after consecutive failed fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(60),
            max: Duration::from_secs(6 * 3600),
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay after the `failures`-th consecutive failure: `base * 2^(failures - 1)`,
    /// capped at `max` and at [`MAX_BACKOFF`].
    pub fn delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max)
            .min(MAX_BACKOFF)
    }

    pub fn retry_after(&self, now: DateTime<Utc>, failures: u32) -> DateTime<Utc> {
        chrono::Duration::from_std(self.delay(failures))
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub feed_id: i64,
    pub feed_url: String,
    pub inserted: usize,
    pub duplicates: usize,
    /// Items without a link, which cannot become posts.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No feed was eligible for fetching.
    Idle,
    Fetched(TickReport),
}

pub struct IngestionPipeline<S> {
    store: Arc<S>,
    fetcher: Arc<dyn FeedFetcher + Send + Sync>,
    backoff: BackoffPolicy,
}

impl<S: Store + Send + Sync> IngestionPipeline<S> {
    pub fn new(store: Arc<S>, fetcher: Arc<dyn FeedFetcher + Send + Sync>) -> Self {
        Self::with_backoff(store, fetcher, BackoffPolicy::default())
    }

    pub fn with_backoff(
        store: Arc<S>,
        fetcher: Arc<dyn FeedFetcher + Send + Sync>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            store,
            fetcher,
            backoff,
        }
    }

    pub async fn tick(&self) -> Result<TickOutcome> {
        self.tick_at(Utc::now()).await
    }

    /// Run one tick as if the current time were `now`.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<TickOutcome> {
        let Some(feed) = self.store.select_next_feed_to_fetch(now)? else {
            tracing::debug!("no feed eligible for fetching");
            return Ok(TickOutcome::Idle);
        };

        // Marked before the network call so a slow or failing feed is not
        // picked again on the next tick.
        self.store.mark_feed_fetched(feed.id, now)?;

        tracing::info!(feed_id = feed.id, url = %feed.url, "fetching feed");

        let document = match self.fetcher.fetch_feed(&feed.url).await {
            Ok(document) => document,
            Err(e) => {
                self.record_failure(&feed, &e.to_string(), now)?;
                return Err(GatorError::Fetch(e));
            }
        };

        let mut report = TickReport {
            feed_id: feed.id,
            feed_url: feed.url.clone(),
            inserted: 0,
            duplicates: 0,
            skipped: 0,
        };

        for item in document.items {
            let Some(post) = new_post(feed.id, item) else {
                report.skipped += 1;
                continue;
            };
            if save_post(self.store.as_ref(), &post)? {
                report.inserted += 1;
            } else {
                report.duplicates += 1;
            }
        }

        self.store.record_fetch_success(feed.id)?;

        tracing::info!(
            feed_id = feed.id,
            inserted = report.inserted,
            duplicates = report.duplicates,
            skipped = report.skipped,
            "feed ingested"
        );

        Ok(TickOutcome::Fetched(report))
    }

    fn record_failure(&self, feed: &Feed, error: &str, now: DateTime<Utc>) -> Result<()> {
        let failures = feed.consecutive_failures.saturating_add(1);
        let retry_after = self.backoff.retry_after(now, failures);
        let failures = self.store.record_fetch_failure(feed.id, error, retry_after)?;

        tracing::warn!(
            feed_id = feed.id,
            url = %feed.url,
            failures,
            retry_after = %retry_after,
            error,
            "feed fetch failed, backing off"
        );

        Ok(())
    }
}

/// Insert `post`, treating an already-stored url as success.
///
/// Returns `true` when a row was inserted and `false` for a duplicate; the
/// existing row is left untouched.
pub fn save_post<S: Store + ?Sized>(store: &S, post: &NewPost) -> Result<bool> {
    match store.create_post(post) {
        Ok(_) => Ok(true),
        Err(GatorError::DuplicatePost(url)) => {
            tracing::trace!(%url, "post already ingested");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

fn new_post(feed_id: i64, item: FeedItem) -> Option<NewPost> {
    let url = item.link.filter(|link| !link.is_empty())?;
    Some(NewPost {
        feed_id,
        title: item.title.unwrap_or_default(),
        url,
        description: item.description.filter(|d| !d.is_empty()),
        published_at: item.published_at,
    })
}
