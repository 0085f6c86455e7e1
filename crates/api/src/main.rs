use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prism_api::config::{LogFormat, ServerConfig};
use prism_api::router::build_app_router;
use prism_api::state::AppState;
use prism_db::models::model_route::CreateModelRoute;
use prism_db::{JobStore, MemoryJobStore, MemoryRouteCatalog, PgJobStore, PgRouteCatalog, RouteCatalog};
use prism_providers::{MockAdapter, ModelRegistry, ReplicateAdapter};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::from_env();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "prism_api=debug,prism_pipeline=debug,tower_http=debug".into());
    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Persistence ---
    let (pool, store, catalog): (_, Arc<dyn JobStore>, Arc<dyn RouteCatalog>) =
        match &config.database_url {
            Some(database_url) => {
                let pool = prism_db::create_pool(database_url)
                    .await
                    .expect("Failed to connect to database");
                prism_db::health_check(&pool)
                    .await
                    .expect("Database health check failed");
                prism_db::run_migrations(&pool)
                    .await
                    .expect("Failed to run database migrations");
                tracing::info!("Database ready, migrations applied");
                (
                    Some(pool.clone()),
                    Arc::new(PgJobStore::new(pool.clone())) as Arc<dyn JobStore>,
                    Arc::new(PgRouteCatalog::new(pool)) as Arc<dyn RouteCatalog>,
                )
            }
            None => {
                tracing::warn!("DATABASE_URL not set; jobs are kept in memory");
                (
                    None,
                    Arc::new(MemoryJobStore::new()) as Arc<dyn JobStore>,
                    Arc::new(MemoryRouteCatalog::new()) as Arc<dyn RouteCatalog>,
                )
            }
        };

    if let Some(path) = &config.model_routes_path {
        for route in load_routes(path) {
            let route = catalog
                .upsert_route(&route)
                .await
                .expect("Failed to register model route");
            tracing::info!(model = %route.identifier, provider = %route.provider, "Model route registered");
        }
    }

    // --- Providers ---
    let mut registry = ModelRegistry::new(Arc::clone(&catalog));
    if let Some(replicate) = config.replicate.clone() {
        let adapter = ReplicateAdapter::new(replicate).expect("Failed to build provider client");
        registry.register(Arc::new(adapter));
    } else {
        tracing::warn!("REPLICATE_API_TOKEN not set; replicate adapter not registered");
    }
    if config.enable_mock_provider {
        registry.register(Arc::new(MockAdapter::new(config.mock_webhook_secret.clone())));
    }
    if config.public_base_url.is_none() {
        tracing::info!("PUBLIC_BASE_URL not set; jobs are reconciled by polling only");
    }
    for provider in config.unverifiable_webhook_providers() {
        tracing::warn!(
            provider,
            "Webhook secret is empty while strict validation is on; every webhook \
             from this provider will be rejected with 401",
        );
    }

    // --- App state ---
    let config = Arc::new(config);
    let state = AppState::new(Arc::clone(&config), pool, store, catalog, registry);

    // --- Background tasks ---
    let event_logger = tokio::spawn(prism_events::EventLogger::run(state.event_bus.subscribe()));

    let cancel = tokio_util::sync::CancellationToken::new();
    let sweeper = prism_api::background::spawn_sweeper(
        Arc::clone(&state.service),
        config.poll_interval_secs,
        cancel.clone(),
    );

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    if let Some(handle) = sweeper {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    // The router (and with it the last bus sender) is gone, so the logger
    // sees the channel close.
    let _ = tokio::time::timeout(Duration::from_secs(5), event_logger).await;

    tracing::info!("Graceful shutdown complete");
}

/// Read model routes from a JSON array file. Panics on a bad file.
fn load_routes(path: &str) -> Vec<CreateModelRoute> {
    let raw = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read MODEL_ROUTES_PATH '{path}': {e}"));
    serde_json::from_str(&raw)
        .unwrap_or_else(|e| panic!("Invalid model routes in '{path}': {e}"))
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
