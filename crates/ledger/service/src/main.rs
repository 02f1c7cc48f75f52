//! Evidence ledger service.
//!
//! HTTP surface over the evidence ledger, the six channel adapters, the
//! parity enforcer, the mapping gate, and the escalation router.

use clap::Parser;
use gate_rules::RuleSet;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod handlers;
mod router;
mod state;

use config::ServiceConfig;
use state::AppState;

#[derive(Parser)]
#[command(name = "ledgerd")]
#[command(about = "Evidence ledger and mapping gate service", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "LEDGER_CONFIG")]
    config: Option<String>,

    /// Listen address, overrides configuration
    #[arg(short, long, env = "LEDGER_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level
    #[arg(long, env = "LEDGER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "LEDGER_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());
    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let mut config = ServiceConfig::load(cli.config.as_deref())?;
    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen.parse()?;
    }

    let state = AppState::new(RuleSet::v1())?;
    let app = router::create_router(state, config.server.enable_cors);

    let listener = TcpListener::bind(config.server.listen_addr).await?;
    tracing::info!(addr = %config.server.listen_addr, "evidence ledger service listening");
    axum::serve(listener, app).await?;

    Ok(())
}
