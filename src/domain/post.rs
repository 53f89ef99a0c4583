use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "(Untitled)"
        } else {
            &self.title
        }
    }

    pub fn display_description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(title: &str, description: Option<&str>) -> Post {
        Post {
            id: 1,
            feed_id: 1,
            title: title.into(),
            url: "https://example.com/p/1".into(),
            description: description.map(String::from),
            published_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_display_title_with_title() {
        assert_eq!(post("My Article", None).display_title(), "My Article");
    }

    #[test]
    fn test_display_title_without_title() {
        assert_eq!(post("", None).display_title(), "(Untitled)");
    }

    #[test]
    fn test_display_description_empty_when_missing() {
        assert_eq!(post("t", None).display_description(), "");
        assert_eq!(post("t", Some("body")).display_description(), "body");
    }
}
