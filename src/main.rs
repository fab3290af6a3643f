//! Process bootstrap for the chat server.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use parley_server::blob::FsBlobStore;
use parley_server::config::{Args, AssetUrls};
use parley_server::server;
use parley_server::state::{AppState, SharedState};
use parley_server::store::MongoStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    info!("starting parley server v{}", env!("CARGO_PKG_VERSION"));
    info!("bind address: {}:{}", args.host, args.port);

    let store = MongoStore::connect(&args.db_uri)
        .await
        .context("failed to connect to the document store")?;

    let blobs = FsBlobStore::new(
        args.blob_dir.clone(),
        args.blob_public_url(),
        args.max_blob_size,
    );
    blobs
        .init()
        .await
        .context("failed to initialize the blob store")?;
    let blob_dir = blobs.dir().to_path_buf();

    let state: SharedState = Arc::new(AppState::new(
        Arc::new(store),
        Arc::new(blobs),
        AssetUrls::from_env(),
    ));

    let listener = tokio::net::TcpListener::bind((args.host.as_str(), args.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", args.host, args.port))?;

    info!("listening on {}:{}", args.host, args.port);

    server::serve(listener, state, Some(blob_dir.as_path()))
        .await
        .context("server terminated")?;

    Ok(())
}
