//! Substance Atlas Server
//!
//! HTTP entry point: wires configuration, the Postgres-backed status cache,
//! and the provider clients into the status pipeline.

use std::net::SocketAddr;
use std::sync::Arc;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use substance_atlas::api::{create_status_router, AppState};
use substance_atlas::cache::PgStatusStore;
use substance_atlas::config::AtlasConfig;
use substance_atlas::orchestrator::StatusOrchestrator;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "substance_atlas=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Substance Atlas server");

    let config = Arc::new(AtlasConfig::from_env()?);
    tracing::info!(
        resolver = config.resolver.model.as_str(),
        enrichment = config.enrichment.model.as_str(),
        jurisdictions = config.jurisdictions.codes().len(),
        "configuration loaded"
    );

    // Database connection
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgresql:///substance_atlas".to_string());

    let pool = match sqlx::PgPool::connect(&database_url).await {
        Ok(p) => {
            tracing::info!("Database connection established");
            p
        }
        Err(e) => {
            tracing::error!("Failed to connect to database at {}: {}", database_url, e);
            tracing::error!(
                "Please check DATABASE_URL environment variable and ensure PostgreSQL is running"
            );
            return Err(format!("Database connection failed: {}", e).into());
        }
    };

    let store = PgStatusStore::new(pool);
    store.ensure_schema().await?;

    let orchestrator = Arc::new(StatusOrchestrator::from_config(config, Arc::new(store))?);

    // CORS for development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_status_router(AppState::new(orchestrator)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    let port: u16 = std::env::var("SERVER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!("Substance Atlas listening on http://{}", addr);
    tracing::info!("  POST /api/predict - resolve + per-jurisdiction status");
    tracing::info!("  POST /api/refresh - forced cache repopulation");
    tracing::info!("  GET  /            - liveness probe");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            if e.kind() == std::io::ErrorKind::AddrInUse {
                tracing::error!(
                    "Port {} is already in use. Try: lsof -ti:{} | xargs kill -9",
                    port,
                    port
                );
            }
            return Err(format!("Failed to bind to {}: {}", addr, e).into());
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        return Err(format!("Server error: {}", e).into());
    }

    Ok(())
}
