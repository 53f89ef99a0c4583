use chrono::{DateTime, Utc};
use feed_rs::parser;
use html_escape::decode_html_entities;

use crate::fetcher::FetchError;

/// A parsed feed: channel metadata plus its items in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedDocument {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub items: Vec<FeedItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Parse an RSS 0.9x/1.0/2.0, Atom or JSON Feed body.
pub fn parse_document(body: &[u8]) -> Result<FeedDocument, FetchError> {
    let feed = parser::parse(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    let items = feed
        .entries
        .into_iter()
        .map(|entry| FeedItem {
            title: entry.title.map(|t| decode(&t.content)),
            link: entry.links.first().map(|l| l.href.trim().to_string()),
            description: entry
                .summary
                .map(|s| decode(&s.content))
                .or_else(|| entry.content.and_then(|c| c.body).map(|b| decode(&b))),
            published_at: entry
                .published
                .or(entry.updated)
                .map(|dt| dt.with_timezone(&Utc)),
        })
        .collect();

    Ok(FeedDocument {
        title: feed.title.map(|t| decode(&t.content)),
        link: feed.links.first().map(|l| l.href.clone()),
        description: feed.description.map(|d| decode(&d.content)),
        items,
    })
}

fn decode(s: &str) -> String {
    decode_html_entities(s).trim().to_string()
}
