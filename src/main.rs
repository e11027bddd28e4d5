use irgadgets_api::api::{build_router, AppState};
use irgadgets_api::config::Config;
use irgadgets_api::security::RateLimits;
use irgadgets_api::{logging, seed, storage};

use std::net::SocketAddr;
use tokio::signal;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env file if present; reported once logging is up
    let dotenv_result = dotenvy::dotenv();

    // Load configuration
    let config = Config::from_env()?;
    let socket_addr = config.socket_addr()?;

    let _log_guards = logging::init(
        &config.log_dir,
        &config.log_level,
        !config.environment.is_production(),
    );

    match dotenv_result {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) => debug!("No .env file loaded: {}", e),
    }

    info!("Starting catalog API on {}", socket_addr);
    info!("Environment: {}", config.environment);
    info!("CORS origins: {:?}", config.cors_origins);
    info!(
        "Rate limits: {} requests / {} inquiries per {:?}",
        config.rate_limits.api_max_requests,
        config.rate_limits.inquiry_max_requests,
        config.rate_limits.window
    );

    let storage = storage::connect(&config).await?;

    // A failed seed leaves the API usable, just with an empty catalog
    match seed::seed_if_empty(storage.as_ref()).await {
        Ok(0) => {}
        Ok(count) => info!("Seeded catalog with {} products", count),
        Err(e) => error!("Catalog seeding failed: {}", e),
    }

    let limits = RateLimits::new(&config.rate_limits, config.trusted_proxies.clone());
    limits.spawn_purge_task(Duration::from_secs(60));

    let state = AppState::new(storage, config.environment);
    let app = build_router(state, &config, &limits);

    // Create listener
    let listener = tokio::net::TcpListener::bind(&socket_addr).await?;
    info!("Server listening on {}", socket_addr);
    info!("Health check: http://{}/health", socket_addr);

    // Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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

    info!("Received shutdown signal");
}
