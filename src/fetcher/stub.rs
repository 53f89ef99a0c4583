use std::sync::Mutex;

use async_trait::async_trait;

use crate::fetcher::{FeedFetcher, FetchError};
use crate::parser::FeedDocument;

/// Serves canned documents by url; urls without an entry fail with status 500.
#[derive(Default)]
pub struct StubFetcher {
    documents: Mutex<Vec<(String, FeedDocument)>>,
    calls: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn serve(&self, url: &str, document: FeedDocument) {
        self.documents
            .lock()
            .unwrap()
            .push((url.to_string(), document));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedFetcher for StubFetcher {
    async fn fetch_feed(&self, url: &str) -> Result<FeedDocument, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.documents
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _)| u == url)
            .map(|(_, d)| d.clone())
            .ok_or(FetchError::Status(500))
    }
}
