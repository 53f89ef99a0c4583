//! # gator
//!
//! A command-line RSS aggregator: users register, follow feeds, and browse
//! the posts a background poller collects.
//!
//! ## Architecture
//!
//! ```text
//! Cli → router → handlers → Store
//!                  └─ agg → FeedScheduler → IngestionPipeline → FeedFetcher
//!                                                              → Store
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! gator register alice
//! gator addfeed "Rust Blog" https://blog.rust-lang.org/feed.xml
//! gator agg 1m        # poll one feed per minute, Ctrl-C to stop
//! gator browse 5
//! ```

/// Application context, session and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires the store and fetcher
/// together; [`Session`](app::Session) carries the logged-in user.
pub mod app;

/// Command-line interface: clap entry point, command router and handlers.
pub mod cli;

/// Configuration file holding the database location and session user.
pub mod config;

/// Core domain models: users, feeds, follows and posts.
pub mod domain;

/// HTTP fetching of feed documents.
///
/// - [`FeedFetcher`](fetcher::FeedFetcher): async trait for feed fetching
/// - [`HttpFetcher`](fetcher::HttpFetcher): reqwest-based implementation
pub mod fetcher;

/// One polling tick: select, fetch and idempotently persist a feed's posts.
pub mod ingest;

/// Feed parsing into a normalized [`FeedDocument`](parser::FeedDocument).
pub mod parser;

/// Fixed-cadence polling loop used by `agg`.
pub mod scheduler;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;
