//! Maps a command name and its arguments onto a [`Command`] and runs it.
//!
//! Dispatch is one exhaustive `match`; the only "unknown command" failure is
//! at the parse boundary. Commands that act on behalf of a user resolve the
//! session through [`require_login`] before their handler runs.

use std::time::Duration;

use crate::app::{AppContext, GatorError, Result, Session};
use crate::cli::commands;
use crate::domain::User;
use crate::scheduler;
use crate::store::Store;

pub const DEFAULT_BROWSE_LIMIT: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register { username: String },
    Login { username: String },
    Reset,
    Users,
    Agg { interval: Duration },
    AddFeed { name: String, url: String },
    Feeds,
    Follow { url: String },
    Unfollow { url: String },
    Following,
    Browse { limit: u32 },
}

impl Command {
    /// Parse `name` (exact, case-sensitive) and validate its arguments.
    pub fn parse(name: &str, args: &[String]) -> Result<Self> {
        let command = match name {
            "register" => {
                let [username] = expect_args(name, args, ["<username>"])?;
                Command::Register { username }
            }
            "login" => {
                let [username] = expect_args(name, args, ["<username>"])?;
                Command::Login { username }
            }
            "reset" => {
                expect_args(name, args, [])?;
                Command::Reset
            }
            "users" => {
                expect_args(name, args, [])?;
                Command::Users
            }
            "agg" => {
                let [raw] = expect_args(name, args, ["<interval>"])?;
                let interval =
                    scheduler::parse_interval(&raw).map_err(GatorError::InvalidArguments)?;
                Command::Agg { interval }
            }
            "addfeed" => {
                let [feed_name, url] = expect_args(name, args, ["<name>", "<url>"])?;
                validate_feed_url(&url)?;
                Command::AddFeed {
                    name: feed_name,
                    url,
                }
            }
            "feeds" => {
                expect_args(name, args, [])?;
                Command::Feeds
            }
            "follow" => {
                let [url] = expect_args(name, args, ["<url>"])?;
                Command::Follow { url }
            }
            "unfollow" => {
                let [url] = expect_args(name, args, ["<url>"])?;
                Command::Unfollow { url }
            }
            "following" => {
                expect_args(name, args, [])?;
                Command::Following
            }
            "browse" => {
                let limit = match args {
                    [] => DEFAULT_BROWSE_LIMIT,
                    [raw] => raw.parse::<u32>().map_err(|_| {
                        GatorError::InvalidArguments(format!(
                            "browse limit must be a non-negative number, got {raw:?}"
                        ))
                    })?,
                    _ => return Err(usage_error(name, &["[limit]"])),
                };
                Command::Browse { limit }
            }
            other => return Err(GatorError::CommandNotFound(other.to_string())),
        };

        Ok(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Register { .. } => "register",
            Command::Login { .. } => "login",
            Command::Reset => "reset",
            Command::Users => "users",
            Command::Agg { .. } => "agg",
            Command::AddFeed { .. } => "addfeed",
            Command::Feeds => "feeds",
            Command::Follow { .. } => "follow",
            Command::Unfollow { .. } => "unfollow",
            Command::Following => "following",
            Command::Browse { .. } => "browse",
        }
    }
}

fn expect_args<const N: usize>(
    name: &str,
    args: &[String],
    usage: [&str; N],
) -> Result<[String; N]> {
    <[String; N]>::try_from(args.to_vec()).map_err(|_| usage_error(name, &usage))
}

fn usage_error(name: &str, usage: &[&str]) -> GatorError {
    if usage.is_empty() {
        GatorError::InvalidArguments(format!("usage: {name} (takes no arguments)"))
    } else {
        GatorError::InvalidArguments(format!("usage: {name} {}", usage.join(" ")))
    }
}

fn validate_feed_url(raw: &str) -> Result<()> {
    let url = url::Url::parse(raw)
        .map_err(|e| GatorError::InvalidArguments(format!("invalid feed url {raw:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(GatorError::InvalidArguments(format!(
            "feed url must use http or https, got {scheme}"
        ))),
    }
}

/// Resolve the session user in the store, failing with `NotLoggedIn` when
/// there is none.
pub fn require_login<S: Store + ?Sized>(store: &S, session: &Session) -> Result<User> {
    let name = session.current_user().ok_or(GatorError::NotLoggedIn)?;
    store.get_user_by_name(name)?.ok_or(GatorError::NotLoggedIn)
}

pub async fn run(
    ctx: &AppContext,
    session: &mut Session,
    name: &str,
    args: &[String],
) -> Result<()> {
    let command = Command::parse(name, args)?;
    dispatch(ctx, session, command).await
}

pub async fn dispatch(ctx: &AppContext, session: &mut Session, command: Command) -> Result<()> {
    tracing::debug!(command = command.name(), "dispatching");
    let store = ctx.store.as_ref();

    match command {
        Command::Register { username } => commands::register(ctx, session, &username),
        Command::Login { username } => commands::login(ctx, session, &username),
        Command::Reset => commands::reset(ctx),
        Command::Users => commands::list_users(ctx, session),
        Command::Agg { interval } => commands::agg(ctx, interval).await,
        Command::AddFeed { name, url } => {
            let user = require_login(store, session)?;
            commands::add_feed(ctx, &user, &name, &url)
        }
        Command::Feeds => commands::list_feeds(ctx),
        Command::Follow { url } => {
            let user = require_login(store, session)?;
            commands::follow(ctx, &user, &url)
        }
        Command::Unfollow { url } => {
            let user = require_login(store, session)?;
            commands::unfollow(ctx, &user, &url)
        }
        Command::Following => {
            let user = require_login(store, session)?;
            commands::following(ctx, &user)
        }
        Command::Browse { limit } => {
            let user = require_login(store, session)?;
            commands::browse(ctx, &user, limit)
        }
    }
}
