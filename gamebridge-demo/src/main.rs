//! gamebridge demo: initialize, greet the local player, open the overlay on
//! a web page and pump events until the frame budget runs out.
//!
//! Usage:
//!   cargo run -p gamebridge-demo -- --url https://www.example.com/ --leaderboard Fastest

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use gamebridge_core::{
    BindingConfig, DomainEvent, EventType, Facade, LeaderboardDisplayType, LeaderboardSortMethod,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gamebridge-demo", about = "Drive the gamebridge binding end to end")]
struct Args {
    /// Application id passed to the runtime.
    #[arg(long, env = "GAMEBRIDGE_APP_ID", default_value_t = 480)]
    app_id: u32,

    /// Page to open in the overlay.
    #[arg(long, default_value = "https://www.example.com/")]
    url: String,

    /// Config file (defaults to $GAMEBRIDGE_CONFIG, then the user config dir).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of pump intervals to run before shutting down.
    #[arg(long, default_value_t = 30)]
    frames: u32,

    /// Look up this leaderboard and stop as soon as it resolves.
    #[arg(long)]
    leaderboard: Option<String>,

    /// Rich presence status to publish.
    #[arg(long)]
    status: Option<String>,
}

fn log_event(label: &'static str) -> impl FnMut(&DomainEvent) -> Result<()> + Send + 'static {
    move |event: &DomainEvent| {
        tracing::info!("{label}: {}", serde_json::to_string(event)?);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs with GAMEBRIDGE_LOG_JSON=1, human-readable otherwise
    let json_logs = std::env::var("GAMEBRIDGE_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::from_default_env()
        .add_directive("gamebridge_core=info".parse()?)
        .add_directive("gamebridge_demo=info".parse()?);
    if json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let args = Args::parse();
    let config = BindingConfig::load(args.config.as_deref())?;
    let mut facade = Facade::with_config(args.app_id, &config)
        .with_context(|| format!("failed to initialize app {}", args.app_id))?;

    let player = facade.localplayer();
    let name = player.get_name()?;
    tracing::info!(
        "Hello, {} (level {}, {})",
        if name.is_empty() { "<unknown>" } else { &name },
        player.get_level()?,
        player.get_ip_country()?
    );
    if let Some(status) = args.status.as_deref() {
        player.set_rich_presence("status", Some(status))?;
    }

    facade.subscribe(EventType::NavigationRequested, log_event("navigation"))?;
    facade.subscribe(EventType::OverlayActivated, log_event("overlay"))?;
    facade.subscribe(EventType::PersonaStateChange, log_event("persona"))?;
    facade.subscribe(EventType::LeaderboardFound, log_event("leaderboard"))?;

    facade.overlay().activate_to_web_page(&args.url)?;

    let pending = match args.leaderboard.as_deref() {
        Some(name) => Some(facade.stats().find_or_create_leaderboard(
            name,
            LeaderboardSortMethod::Ascending,
            LeaderboardDisplayType::Numeric,
        )?),
        None => None,
    };

    let budget = facade.pump_interval() * args.frames;
    let stop = async move {
        match pending {
            Some(pending) => match tokio::time::timeout(budget, pending).await {
                Ok(Some(id)) => tracing::info!("leaderboard id {id}"),
                Ok(None) => tracing::warn!("leaderboard lookup failed"),
                Err(_) => tracing::warn!("leaderboard lookup timed out"),
            },
            None => tokio::time::sleep(budget).await,
        }
    };
    facade.run_pump_loop(stop).await?;

    facade.shutdown()?;
    Ok(())
}
