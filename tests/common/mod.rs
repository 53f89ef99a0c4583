#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use gator::app::AppContext;
use gator::fetcher::{FeedFetcher, FetchError};
use gator::ingest::BackoffPolicy;
use gator::parser::{FeedDocument, FeedItem};
use gator::store::SqliteStore;

/// In-memory fetcher; unknown urls fail with a 404 status.
#[derive(Default)]
pub struct CannedFetcher {
    documents: Mutex<HashMap<String, FeedDocument>>,
}

impl CannedFetcher {
    pub fn serve(&self, url: &str, document: FeedDocument) {
        self.documents
            .lock()
            .unwrap()
            .insert(url.to_string(), document);
    }
}

#[async_trait]
impl FeedFetcher for CannedFetcher {
    async fn fetch_feed(&self, url: &str) -> Result<FeedDocument, FetchError> {
        self.documents
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or(FetchError::Status(404))
    }
}

pub fn test_ctx() -> (AppContext, Arc<CannedFetcher>) {
    let fetcher = Arc::new(CannedFetcher::default());
    let ctx = AppContext::new(
        Arc::new(SqliteStore::in_memory().unwrap()),
        fetcher.clone(),
        BackoffPolicy::default(),
    );
    (ctx, fetcher)
}

pub fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
}

pub fn item(url: &str, title: &str, published_at: Option<DateTime<Utc>>) -> FeedItem {
    FeedItem {
        title: Some(title.to_string()),
        link: Some(url.to_string()),
        description: Some(format!("{title} description")),
        published_at,
    }
}

pub fn document(items: Vec<FeedItem>) -> FeedDocument {
    FeedDocument {
        title: Some("Canned".to_string()),
        link: None,
        description: None,
        items,
    }
}
