//! Fixed-cadence polling loop for the `agg` command.
//!
//! Runs one ingestion tick immediately and then once per interval. Ticks never
//! overlap: a slow tick pushes the next one back instead of running
//! concurrently. A failing tick is logged and the loop carries on; only the
//! shutdown future ends it.

use std::future::Future;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};

use crate::app::{GatorError, Result};
use crate::ingest::{IngestionPipeline, TickOutcome};
use crate::store::Store;

/// Parse an interval like "1m", "30s", "1h30m", "500ms", "2d" or bare seconds.
pub fn parse_interval(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err("Interval is empty".to_string());
    }

    if let Ok(secs) = s.parse::<u64>() {
        return non_zero(Duration::from_secs(secs), &s);
    }

    let mut total = Duration::ZERO;
    let mut rest = s.as_str();

    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(format!(
                "Invalid interval: {}. Use format like '30s', '1m', '1h30m'",
                s
            ));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|_| format!("Invalid number in interval: {}", &rest[..digits]))?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let part = match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            "h" => Duration::from_secs(value.saturating_mul(3600)),
            "d" => Duration::from_secs(value.saturating_mul(86400)),
            "" => return Err(format!("Missing unit after {} in interval {}", value, s)),
            other => return Err(format!("Unknown interval unit: {}", other)),
        };
        total = total.saturating_add(part);
    }

    non_zero(total, &s)
}

fn non_zero(d: Duration, raw: &str) -> std::result::Result<Duration, String> {
    if d.is_zero() {
        Err(format!("Interval must be greater than zero: {}", raw))
    } else {
        Ok(d)
    }
}

/// Format interval for display
pub fn format_interval(d: Duration) -> String {
    let secs = d.as_secs();
    if d.subsec_millis() != 0 || secs == 0 {
        format!("{}ms", d.as_millis())
    } else if secs >= 86400 && secs.is_multiple_of(86400) {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 && secs.is_multiple_of(3600) {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs.is_multiple_of(60) {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Constructed, no tick has run yet.
    Idle,
    Polling,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub ticks: u64,
    pub failures: u64,
    pub posts_inserted: usize,
}

pub struct FeedScheduler<S> {
    pipeline: IngestionPipeline<S>,
    interval: Duration,
    state: SchedulerState,
}

impl<S: Store + Send + Sync> FeedScheduler<S> {
    pub fn new(pipeline: IngestionPipeline<S>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(GatorError::InvalidArguments(
                "polling interval must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            pipeline,
            interval,
            state: SchedulerState::Idle,
        })
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll until `shutdown` resolves. An in-progress tick is allowed to finish.
    pub async fn run<F>(&mut self, shutdown: F) -> SchedulerReport
    where
        F: Future<Output = ()>,
    {
        self.state = SchedulerState::Polling;
        tracing::info!(
            interval = %format_interval(self.interval),
            "collecting feeds"
        );

        let mut report = SchedulerReport::default();
        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            // Shutdown wins when both are ready, so no tick starts after it.
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = timer.tick() => {}
            }

            report.ticks += 1;
            match self.pipeline.tick().await {
                Ok(TickOutcome::Fetched(tick)) => {
                    report.posts_inserted += tick.inserted;
                    if tick.inserted > 0 {
                        println!("{} new posts from {}", tick.inserted, tick.feed_url);
                    }
                }
                Ok(TickOutcome::Idle) => {}
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(error = %e, tick = report.ticks, "polling tick failed");
                }
            }
        }

        tracing::info!(
            ticks = report.ticks,
            failures = report.failures,
            posts_inserted = report.posts_inserted,
            "scheduler stopped"
        );

        report
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to set up SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::domain::NewFeed;
    use crate::fetcher::stub::StubFetcher;
    use crate::parser::{FeedDocument, FeedItem};
    use crate::store::SqliteStore;

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_interval("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_interval("1d").unwrap(), Duration::from_secs(86400));
        assert_eq!(parse_interval("60s").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_interval("3600").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_interval("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_interval("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_interval("1M").unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_interval_rejects_invalid() {
        assert!(parse_interval("invalid").is_err());
        assert!(parse_interval("").is_err());
        assert!(parse_interval("10").is_ok());
        assert!(parse_interval("10x").is_err());
        assert!(parse_interval("h").is_err());
        assert!(parse_interval("0s").is_err());
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("-1m").is_err());
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(Duration::from_secs(3600)), "1h");
        assert_eq!(format_interval(Duration::from_secs(1800)), "30m");
        assert_eq!(format_interval(Duration::from_secs(86400)), "1d");
        assert_eq!(format_interval(Duration::from_secs(90)), "90s");
        assert_eq!(format_interval(Duration::from_millis(1500)), "1500ms");
    }

    fn pipeline_with(urls: &[&str]) -> (Arc<StubFetcher>, IngestionPipeline<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let user = store.create_user("alice").unwrap();
        for url in urls {
            store.create_feed(&NewFeed::new(*url, *url, user.id)).unwrap();
        }
        let fetcher = Arc::new(StubFetcher::default());
        let pipeline = IngestionPipeline::new(store, fetcher.clone());
        (fetcher, pipeline)
    }

    #[test]
    fn test_zero_interval_rejected() {
        let (_, pipeline) = pipeline_with(&[]);
        assert!(matches!(
            FeedScheduler::new(pipeline, Duration::ZERO),
            Err(GatorError::InvalidArguments(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_immediately_then_every_interval() {
        let (_, pipeline) = pipeline_with(&[]);
        let mut scheduler = FeedScheduler::new(pipeline, Duration::from_secs(60)).unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        let report = scheduler
            .run(tokio::time::sleep(Duration::from_secs(150)))
            .await;

        // t = 0, 60, 120
        assert_eq!(report.ticks, 3);
        assert_eq!(report.failures, 0);
        assert_eq!(scheduler.state(), SchedulerState::Polling);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_shutdown_prevents_any_tick() {
        let url = "https://example.com/rss";
        let (fetcher, pipeline) = pipeline_with(&[url]);
        let mut scheduler = FeedScheduler::new(pipeline, Duration::from_secs(60)).unwrap();

        for _ in 0..20 {
            let report = scheduler.run(std::future::ready(())).await;
            assert_eq!(report.ticks, 0);
        }
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_tick_does_not_stop_polling() {
        let broken = "https://broken.example.com/rss";
        let healthy = "https://healthy.example.com/rss";
        let (fetcher, pipeline) = pipeline_with(&[broken, healthy]);
        fetcher.serve(
            healthy,
            FeedDocument {
                items: vec![FeedItem {
                    title: Some("Hello".into()),
                    link: Some("https://healthy.example.com/hello".into()),
                    ..Default::default()
                }],
                ..Default::default()
            },
        );

        let mut scheduler = FeedScheduler::new(pipeline, Duration::from_secs(60)).unwrap();
        let report = scheduler
            .run(tokio::time::sleep(Duration::from_secs(150)))
            .await;

        assert_eq!(report.ticks, 3);
        assert_eq!(report.failures, 1);
        assert_eq!(report.posts_inserted, 1);
        assert_eq!(fetcher.calls(), vec![broken, healthy, healthy]);
    }
}
