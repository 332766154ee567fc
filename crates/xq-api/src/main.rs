//! xq-api - HTTP API over package repodata

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use xq_api::{Cli, ServerState, server};
use xq_core::{SearchIndexer, Store, TantivyIndexer};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    tracing::info!(pid = std::process::id(), "starting xq-api");

    let indexer = cli
        .search_index
        .then(|| Arc::new(TantivyIndexer::new()) as Arc<dyn SearchIndexer>);
    let store = Arc::new(Store::new(indexer));

    store
        .reload(&cli.paths)
        .await
        .context("error loading initial repo data")?;

    #[cfg(unix)]
    server::reload_on_hangup(Arc::clone(&store), cli.paths.clone())
        .context("unable to install SIGHUP handler")?;

    let config = cli.server_config();
    let state = Arc::new(ServerState::new(store, config.max_queries));
    let app = server::router(Arc::clone(&state), &config);
    let listener = TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("unable to listen on {}", cli.listen))?;
    tracing::info!(addr = %listener.local_addr()?, "starting server");

    let shutdown = async move {
        server::shutdown_signal().await;
        state.close();
    };
    server::serve(listener, app, shutdown)
        .await
        .context("server error")
}
