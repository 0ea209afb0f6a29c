use anyhow::Context;
use clap::Parser;
use persistence::JournalStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::Level;
use tracker::{create_router, AppState, Config, ServiceSettings};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(if config.debug { Level::DEBUG } else { Level::INFO })
        .init();

    config.validate()?;

    tracing::info!(
        data_dir = %config.data_dir.display(),
        parse_policy = ?config.parse_policy,
        "Starting tracker service"
    );

    let store = Arc::new(
        JournalStore::open(config.journal_config())
            .with_context(|| format!("failed to open entry store in {}", config.data_dir.display()))?,
    );
    let report = store.recovery_report().clone();
    tracing::info!(
        entries = store.len()?,
        clean = report.is_clean(),
        records = report.records_recovered,
        corrupt = report.corrupt_records,
        unreadable_bytes = report.unreadable_bytes,
        "Entry store ready"
    );

    let settings = ServiceSettings {
        parse_policy: config.parse_policy,
        max_count: config.max_count,
    };
    let state = AppState::new(store.clone(), settings)
        .context("failed to seed latest entry cache")?
        .with_recovery_report(report);

    let app = create_router(state, config.web_root_if_present());

    // Bind and serve
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.sync().context("failed to sync entry store")?;
    tracing::info!("Tracker stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
