use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use rampart::api::{create_router, AppState};
use rampart::config::Config;
use rampart::dispatch::{Dispatch, PolicyDispatcher};
use rampart::observability::init_tracing;
use rampart::service::{Reconciler, RuleService};
use rampart::store::RuleStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Initialize tracing
    init_tracing(&config.log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting rampart control plane"
    );

    // Connect to the database, retrying while it comes up
    let store = Arc::new(
        RuleStore::connect_with_retry(
            &config.database_url,
            config.db_min_connections,
            config.db_max_connections,
            config.db_connect_attempts,
            config.db_connect_retry_interval(),
        )
        .await?,
    );

    if config.run_migrations {
        store.run_migrations().await?;
        info!("Migrations applied");
    }

    // Enforcement point client; the probe is log-only and never gates traffic
    let enforcer = Arc::new(PolicyDispatcher::new(
        config.enforcer_host.clone(),
        config.enforcer_port,
        config.enforcer_timeout(),
    ));

    if let Err(e) = enforcer.test_connection().await {
        warn!(error = %e, "Enforcement point not reachable at startup, continuing");
    }

    let dispatcher = Arc::clone(&enforcer) as Arc<dyn Dispatch>;

    let service = Arc::new(RuleService::new(
        Arc::clone(&store),
        Arc::clone(&dispatcher),
    ));

    // Reconcile at startup, then periodically if configured
    let reconciler = Reconciler::new(Arc::clone(&store), dispatcher);
    let sync_handle = if config.sync_interval_secs > 0 {
        // First tick fires immediately, covering the startup sync
        Some(reconciler.start(config.sync_interval()))
    } else {
        reconciler.sync_rules().await;
        None
    };

    // Create application state and router
    let state = Arc::new(AppState {
        service,
        enforcer,
        start_time: Instant::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    });

    let app = create_router(state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    if config.graceful_shutdown {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        axum::serve(listener, app).await?;
    }

    info!("Shutting down...");
    if let Some(handle) = sync_handle {
        handle.abort();
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
