//! Playforge API server entry point.

use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::Router;
use playforge_api::error::AppError;
use playforge_api::{routes, state};
use playforge_bus::{BusConfig, EventBus};
use playforge_chat::OfflineGenerator;
use playforge_core::clock::{Clock, SystemClock};
use playforge_core::store::StateStore;
use playforge_rules::RuleEngine;
use playforge_runtime::Coordinator;
use playforge_state::StateManager;
use playforge_store::JsonFileStore;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Playforge API server");

    // Read configuration from environment.
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .map_err(|e| AppError::Config(format!("PORT must be a valid u16: {e}")))?;
    let data_dir =
        std::env::var("PLAYFORGE_DATA_DIR").unwrap_or_else(|_| "./data".to_string());
    let handler_timeout_ms: u64 = std::env::var("PLAYFORGE_HANDLER_TIMEOUT_MS")
        .unwrap_or_else(|_| "5000".to_string())
        .parse()
        .map_err(|e| AppError::Config(format!("PLAYFORGE_HANDLER_TIMEOUT_MS must be a u64: {e}")))?;

    // Build the coordination core.
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let bus = EventBus::new(
        BusConfig {
            handler_timeout: Duration::from_millis(handler_timeout_ms),
        },
        Arc::clone(&clock),
    );
    let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::new(&data_dir));
    let state_manager = Arc::new(StateManager::new(store, Arc::clone(&clock)));
    let rules = Arc::new(RwLock::new(RuleEngine::new()));
    let coordinator = Arc::new(Coordinator::start(
        bus.clone(),
        Arc::clone(&state_manager),
        rules,
        Arc::new(OfflineGenerator),
        Arc::clone(&clock),
    ));

    // Build application state.
    let app_state = state::AppState::new(bus, state_manager, coordinator, clock);

    // Build router.
    let app = Router::new()
        .merge(routes::health::router())
        .nest(
            "/api/v1/games",
            routes::games::router().merge(routes::actions::router()),
        )
        .nest("/api/v1/rules", routes::rules::router())
        .nest("/api/v1/state", routes::player_state::router())
        .nest("/api/v1/chat", routes::chat::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server.
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
