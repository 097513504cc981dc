use aisle_server::{
    telemetry::Telemetry, CatalogKind, CatalogServer, Cli, MemoryCatalog, ServerConfig,
    SqliteCatalog, StoreFactory,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::{net::TcpListener, signal};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ServerConfig::try_from(cli)?;
    let telemetry = Telemetry::init(config.metrics_addr)?;

    info!(
        listen_addr = %config.listen_addr,
        catalog = %config.catalog.display(),
        kind = ?config.catalog_kind,
        "starting aisle catalog server"
    );

    match config.catalog_kind {
        CatalogKind::Fixture => {
            let catalog = MemoryCatalog::load(&config.catalog).with_context(|| {
                format!("failed to load catalog fixture {}", config.catalog.display())
            })?;
            run(config, catalog, &telemetry).await
        }
        CatalogKind::Sqlite => {
            if !config.catalog.is_file() {
                bail!("catalog database {} does not exist", config.catalog.display());
            }
            let catalog = SqliteCatalog::new(&config.catalog);
            run(config, catalog, &telemetry).await
        }
    }
}

async fn run<F: StoreFactory>(config: ServerConfig, factory: F, telemetry: &Telemetry) -> Result<()> {
    // Fail at startup rather than on the first connection.
    factory
        .open()
        .with_context(|| format!("failed to open {}", factory.describe()))?;

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .context("failed to bind listener")?;
    let server = CatalogServer::new(factory, config.session.clone());
    server
        .serve(listener, shutdown_signal())
        .await
        .context("server shutdown with error")?;

    info!(
        grace_seconds = config.shutdown_grace.as_secs(),
        open_sessions = server.registry().len(),
        "shutdown signal received; sleeping for graceful period"
    );
    tokio::time::sleep(config.shutdown_grace).await;

    if server.registry().is_empty() {
        info!("no sessions open at shutdown");
    }
    for session in server.registry().snapshot() {
        info!(
            connection_id = %session.connection_id,
            peer = %session.peer,
            age_secs = session.age.as_secs(),
            requests = session.requests,
            "session still open at shutdown"
        );
    }
    if let Some(rendered) = telemetry.render_metrics() {
        debug!(metrics = %rendered, "final metrics snapshot");
    }
    info!("graceful shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
}
