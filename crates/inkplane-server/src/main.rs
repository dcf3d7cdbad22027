//! Inkplane stroke server
//!
//! REST endpoints for stroke persistence plus a WebSocket feed that pushes
//! the full stroke collection after every change.
//!
//! ## Identity
//!
//! The upstream auth proxy sets `x-user-id` and `x-user-name`; requests
//! without them are treated as signed out.

use inkplane_server::{
    CanvasService, FileStrokeRepository, MemoryStrokeRepository, ServerConfig, ServiceLimits,
    StrokeRepository, SystemClock, router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkplane_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env();
    let repository: Arc<dyn StrokeRepository> = match &config.snapshot_path {
        Some(path) => {
            info!("Persisting strokes to {}", path.display());
            Arc::new(FileStrokeRepository::open(path.clone())?)
        }
        None => {
            info!("No snapshot path set, strokes are kept in memory");
            Arc::new(MemoryStrokeRepository::new())
        }
    };

    let service = Arc::new(CanvasService::new(
        ServiceLimits::from(&config),
        repository,
        Arc::new(SystemClock),
    ));

    let app = router(service)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    info!(
        "Admission: {} units per {} ms, batches up to {}",
        config.max_requests_per_window, config.rate_limit_window_ms, config.max_paths_per_batch
    );
    info!("Inkplane server listening on {}", config.bind_addr);
    info!("WebSocket endpoint: ws://{}/ws", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
