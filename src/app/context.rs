use std::sync::Arc;

use crate::app::Result;
use crate::config::Config;
use crate::fetcher::{FeedFetcher, HttpFetcher};
use crate::ingest::{BackoffPolicy, IngestionPipeline};
use crate::store::sqlite::SqliteStore;

pub struct AppContext {
    pub store: Arc<SqliteStore>,
    pub fetcher: Arc<dyn FeedFetcher + Send + Sync>,
    pub backoff: BackoffPolicy,
}

impl AppContext {
    pub fn new(
        store: Arc<SqliteStore>,
        fetcher: Arc<dyn FeedFetcher + Send + Sync>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            store,
            fetcher,
            backoff,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::open(&config.db_location())?);
        let fetcher: Arc<dyn FeedFetcher + Send + Sync> =
            Arc::new(HttpFetcher::with_timeout(config.fetch_timeout())?);
        let backoff = BackoffPolicy::new(config.backoff_base(), config.backoff_max());

        Ok(Self::new(store, fetcher, backoff))
    }

    pub fn in_memory() -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        let fetcher: Arc<dyn FeedFetcher + Send + Sync> = Arc::new(HttpFetcher::new()?);

        Ok(Self::new(store, fetcher, BackoffPolicy::default()))
    }

    pub fn pipeline(&self) -> IngestionPipeline<SqliteStore> {
        IngestionPipeline::with_backoff(self.store.clone(), self.fetcher.clone(), self.backoff)
    }
}
