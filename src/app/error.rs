use thiserror::Error;

use crate::config::ConfigError;
use crate::fetcher::FetchError;

#[derive(Error, Debug)]
pub enum GatorError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Unknown command: {0}")]
    CommandNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("You must be logged in to run this command")]
    NotLoggedIn,

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// A post with this url is already stored. Absorbed by the ingestion pipeline.
    #[error("Duplicate post: {0}")]
    DuplicatePost(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GatorError>;
