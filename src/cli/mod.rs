pub mod commands;
pub mod router;

use std::path::PathBuf;

use clap::Parser;

pub use router::{Command, DEFAULT_BROWSE_LIMIT};

#[derive(Parser)]
#[command(name = "gator")]
#[command(about = "A command-line RSS aggregator", long_about = None)]
#[command(after_help = "Commands:
  register <username>    Create a user and log in as it
  login <username>       Log in as an existing user
  reset                  Delete every user, feed, follow and post
  users                  List users
  agg <interval>         Poll feeds every interval (e.g. 30s, 1m, 1h30m)
  addfeed <name> <url>   Add a feed and follow it
  feeds                  List all feeds
  follow <url>           Follow an existing feed
  unfollow <url>         Stop following a feed
  following              List the feeds you follow
  browse [limit]         Show the most recent posts from followed feeds

Options must come before the command; everything after it is passed to the command.")]
pub struct Cli {
    /// Path to the config file (default: ~/.config/gator/config.toml).
    /// Must precede the command name.
    #[arg(short, long, env = "GATOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Command to run
    pub command: String,

    /// Arguments passed to the command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}
