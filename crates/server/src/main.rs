use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use session_watch_core::{Config, Indexer, IndexerConfig};
use session_watch_server::destinations::{DestinationManager, NoopSessionStartHook};
use session_watch_server::routes::api_routes;
use session_watch_server::state::AppState;
use tracing_subscriber::EnvFilter;

/// Indexes and serves Claude Code session logs over HTTP, with optional
/// Telegram/Slack bots for watching sessions from chat.
#[derive(Debug, Parser)]
#[command(name = "session-watch", version)]
struct Args {
    /// Directory containing per-project session logs (`~/.claude/projects` by
    /// default). Repeatable to index more than one root.
    #[arg(long = "projects-dir")]
    projects_dirs: Vec<std::path::PathBuf>,

    /// Directory for the persisted index and destinations config.
    #[arg(long)]
    state_dir: Option<std::path::PathBuf>,

    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "127.0.0.1:4317")]
    bind: SocketAddr,

    /// Telegram bot token. Read from `TELEGRAM_BOT_TOKEN` if unset.
    #[arg(long, env = "TELEGRAM_BOT_TOKEN")]
    telegram_bot_token: Option<String>,

    /// Slack bot token. Read from `SLACK_BOT_TOKEN` if unset.
    #[arg(long, env = "SLACK_BOT_TOKEN")]
    slack_bot_token: Option<String>,

    /// Skip the background refresh loop; only refresh on explicit API calls.
    #[arg(long)]
    no_background_refresh: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let projects_dirs = if args.projects_dirs.is_empty() {
        vec![dirs::home_dir()
            .map(|home| home.join(".claude").join("projects"))
            .ok_or_else(|| anyhow::anyhow!("could not determine projects directory; pass --projects-dir"))?]
    } else {
        args.projects_dirs.clone()
    };
    let state_dir = args
        .state_dir
        .or_else(|| dirs::home_dir().map(|home| home.join(".claude").join("session-watch")))
        .ok_or_else(|| anyhow::anyhow!("could not determine state directory; pass --state-dir"))?;
    std::fs::create_dir_all(&state_dir)?;

    let indexer_config = IndexerConfig::default();
    let refresh_interval = Duration::from_secs(indexer_config.refresh_interval_secs);
    let indexer = Arc::new(Indexer::with_roots(projects_dirs, state_dir.clone(), indexer_config));

    tracing::info!("running initial index refresh");
    indexer.refresh(true).await?;

    let destinations_path = state_dir.join("destinations.yaml");
    let destinations = Arc::new(DestinationManager::new(destinations_path.clone(), Arc::new(NoopSessionStartHook)));
    let config = Config::load(&destinations_path)?;
    destinations.restore_from_config(&config);

    let state = AppState::new(indexer.clone(), destinations, args.telegram_bot_token.clone(), args.slack_bot_token.clone());

    if !args.no_background_refresh {
        let background_indexer = indexer.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(refresh_interval);
            ticker.tick().await; // skip the immediate tick; we just refreshed above
            loop {
                ticker.tick().await;
                if let Err(err) = background_indexer.refresh(false).await {
                    tracing::warn!(error = %err, "background index refresh failed");
                }
            }
        });
    }

    {
        let cleanup_state = state.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(60));
            loop {
                ticker.tick().await;
                cleanup_state.search_limiter.cleanup();
                cleanup_state.preview_limiter.cleanup();
                cleanup_state.refresh_limiter.cleanup();
                cleanup_state.chat_limiter.cleanup();
                cleanup_state.search_states.cleanup_expired();
            }
        });
    }

    let app = api_routes(state);
    tracing::info!(addr = %args.bind, "starting session-watch server");
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
