use super::handlers;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Chunk upload and end-of-stream
        .route("/audio", post(handlers::upload_chunk))
        .route("/audio_end", post(handlers::end_stream))
        // Open sessions
        .route("/sessions", get(handlers::list_sessions))
        .layer(DefaultBodyLimit::max(state.max_chunk_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                // Browser recorders are served from another origin
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
