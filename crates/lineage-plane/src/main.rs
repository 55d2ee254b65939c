//! Lineage Plane Server Binary
//!
//! Runs the HTTP service exposing the token, ledger, and verification
//! endpoints over the engine.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lineage_plane::{create_router, AppState, Engine, EngineConfig};

#[tokio::main]
async fn main() {
    // Initialize logging
    let filter = EnvFilter::try_from_env("LINEAGE_LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    // Configuration
    let port: u16 = env::var("LINEAGE_PORT")
        .unwrap_or_else(|_| "8090".into())
        .parse()
        .expect("LINEAGE_PORT must be a valid port number");

    let data_dir = env::var("LINEAGE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./lineage-data"));

    let config = EngineConfig {
        data_dir: Some(data_dir.clone()),
        system_secret: env::var("LINEAGE_SYSTEM_SECRET").ok(),
        ..EngineConfig::default()
    };

    let engine = Engine::new(config)
        .await
        .expect("Failed to initialize engine");

    info!(
        session_id = %engine.session_id(),
        data_dir = %data_dir.display(),
        accumulator = %engine.accumulator(),
        port = port,
        "Starting lineage plane server"
    );

    let state = Arc::new(AppState {
        engine: Arc::new(engine),
    });
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    info!(addr = %addr, "Lineage plane listening");

    axum::serve(listener, app).await.expect("Server error");
}
