use anyhow::Context;
use clap::Parser;
use ledger_node::{build_router, AppState, Args, Miner, PeerClient};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = args.ledger_config();
    let peers = PeerClient::new(args.peer_timeout()).context("building peer client")?;
    info!(node_url = %config.node_url, reward_address = %config.reward_address, "starting node");

    let state = AppState::new(config, peers);
    let miner = state.miner.clone();
    let app = build_router(state);

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    info!("ledger-node listening on http://{}", args.listen);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(miner))
        .await?;
    info!("ledger-node stopped");
    Ok(())
}

async fn shutdown_signal(miner: Miner) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested, cancelling mining");
    miner.cancel();
}
