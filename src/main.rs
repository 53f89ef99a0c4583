use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gator::app::{AppContext, Session};
use gator::cli::{router, Cli};
use gator::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; the poller reports progress at info level
    let default_filter = if cli.command == "agg" { "gator=info" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_config_path()?,
    };

    let mut config = Config::load_from(&config_path)?;
    let ctx = AppContext::from_config(&config)?;
    let mut session = Session::new(config.current_user_name.clone());

    let result = router::run(&ctx, &mut session, &cli.command, &cli.args).await;

    // Handlers may have changed the session before failing; keep what they set.
    if config.sync_session(&session, &config_path)? {
        tracing::debug!(path = %config_path.display(), "saved session user");
    }

    result?;
    Ok(())
}
