//! Server runner: router construction, binding and graceful shutdown.

use std::{future::Future, sync::Arc, time::Duration};

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{
    infrastructure::repository::{InMemoryMessageStore, InMemorySessionStore},
    ui::{
        config::ServerConfig,
        error::ServerError,
        handler::{health_check, list_connections, websocket_handler},
        signal::shutdown_signal,
        state::AppState,
    },
};

/// How long open connections get to close after shutdown starts
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws/chat", get(websocket_handler))
        .route("/api/health", get(health_check))
        .route("/api/connections", get(list_connections))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the state backed by the in-memory session and message stores.
pub fn build_state(config: &ServerConfig) -> Arc<AppState> {
    let sessions = InMemorySessionStore::with_sessions(
        config
            .sessions
            .iter()
            .map(|seed| (seed.token.clone(), seed.user_id)),
    );
    let messages = InMemoryMessageStore::with_capacity(config.message_capacity);
    Arc::new(AppState::new(config, Arc::new(sessions), Arc::new(messages)))
}

/// Run the server until Ctrl+C or SIGTERM.
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    match serde_json::to_string(&config) {
        Ok(dump) => tracing::debug!("configuration: {}", dump),
        Err(e) => tracing::warn!("could not dump configuration: {}", e),
    }
    tracing::info!(
        "anonymous policy: {:?}, seeded sessions: {}",
        config.anonymous_policy,
        config.sessions.len()
    );

    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;

    serve(listener, build_state(&config), shutdown_signal()).await
}

/// Serve on an already bound listener until `signal` resolves, then close
/// every open connection.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    if let Ok(address) = listener.local_addr() {
        tracing::info!("WebSocket chat hub listening on ws://{}/ws/chat", address);
    }

    let shutdown_state = state.clone();
    let app = build_router(state.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.await;
            tracing::info!("shutting down, closing open connections");
            shutdown_state.begin_shutdown();
        })
        .await
        .map_err(ServerError::Serve)?;

    drain_connections(&state).await;
    tracing::info!("server stopped");
    Ok(())
}

async fn drain_connections(state: &AppState) {
    let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
    while !state.registry.is_empty().await {
        if tokio::time::Instant::now() >= deadline {
            let remaining = state.registry.len().await;
            tracing::warn!(remaining, "connections still open after {:?}", DRAIN_TIMEOUT);
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
