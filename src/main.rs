//! davsync server: ownCloud-compatible WebDAV sync front end.
//!
//! Main entry point that wires all crates together and starts the server.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use davsync_core::config::{AppConfig, LogFormat};
use davsync_core::config::storage::normalize_dav_root;
use davsync_database::{DatabasePool, Stores};
use davsync_entity::{DAV_ROOT, VERSION};
use davsync_webdav::{DavContext, LocalDavBackend, Router, SessionDecoder, WebDavServer};

/// Command line flags.
#[derive(Debug, Parser)]
#[command(name = "davsync-server", version, about)]
struct Args {
    /// Configuration environment, selects `<config-dir>/<env>.*`
    #[arg(long, default_value = "development")]
    env: String,

    /// Directory holding `default.*` and the per-environment files
    #[arg(long, default_value = "config")]
    config_dir: String,

    /// Keep metadata in memory instead of PostgreSQL
    #[arg(long)]
    memory: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match AppConfig::load_from(&args.config_dir, &args.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config, args).await {
        tracing::error!("Server error: {:#}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig, args: Args) -> anyhow::Result<()> {
    tracing::info!(
        "Starting davsync v{} (env: {})",
        env!("CARGO_PKG_VERSION"),
        args.env
    );

    // ── Step 1: Metadata store ───────────────────────────────────
    let (stores, pool) = if args.memory {
        tracing::warn!("Running with in-memory metadata; nothing survives a restart");
        (Stores::memory(), None)
    } else {
        tracing::info!("Connecting to database...");
        let pool = DatabasePool::connect(&config.database)
            .await
            .context("Database connection failed")?;
        pool.health_check()
            .await
            .context("Database is not answering queries")?;

        tracing::info!("Running database migrations...");
        davsync_database::migration::run_migrations(pool.pool())
            .await
            .context("Migration failed")?;
        tracing::info!("Database migrations complete");
        (pool.stores(), Some(pool))
    };

    // ── Step 2: Persisted settings ───────────────────────────────
    let dav_root = match stores.settings.get(DAV_ROOT).await? {
        Some(root) => normalize_dav_root(&root),
        None => {
            stores
                .settings
                .set(DAV_ROOT, &config.storage.dav_root)
                .await?;
            config.storage.dav_root.clone()
        }
    };
    stores
        .settings
        .set(VERSION, env!("CARGO_PKG_VERSION"))
        .await?;

    // ── Step 3: Storage root ─────────────────────────────────────
    let dav_root = PathBuf::from(dav_root);
    tokio::fs::create_dir_all(&dav_root)
        .await
        .with_context(|| format!("Cannot create DAV root {}", dav_root.display()))?;
    tracing::info!("Serving files from {}", dav_root.display());

    // ── Step 4: WebDAV engine and adapters ───────────────────────
    let prefix = config.storage.webdav_prefix.clone();
    let backend = Arc::new(LocalDavBackend::new(&dav_root, &prefix));
    let sessions = SessionDecoder::new(&config.auth).context("Invalid auth configuration")?;
    let ctx = Arc::new(DavContext::new(stores, backend, dav_root, &prefix));

    // ── Step 5: Shutdown channel ─────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Step 6: Start server ─────────────────────────────────────
    let addr = config.server.listen_addr()?;
    let server = WebDavServer::new(Router::new(ctx, sessions), addr);
    let server_handle = tokio::spawn(async move { server.start(shutdown_rx).await });

    // ── Step 7: Wait for shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping...");
    let _ = shutdown_tx.send(true);

    match server_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("Server stopped with error: {}", e),
        Err(e) => tracing::error!("Server task panicked: {}", e),
    }

    if let Some(pool) = pool {
        pool.close().await;
    }

    tracing::info!("davsync stopped");
    Ok(())
}

/// Resolve when Ctrl-C or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
