use minesweeper_common::models::GameParams;
use minesweeper_engine::{EngineConfig, Session, error::Result, harness};
use tokio::io::{self, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the protocol, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = EngineConfig::from_env();
    info!("🚀 Starting minesweeper with {:?}", config);

    let (session, events) = Session::subscribe(GameParams::default(), config)?;
    harness::run(session, events, BufReader::new(io::stdin()), io::stdout()).await
}
