//! Axum router construction for the canvas API.
//!
//! Assembles all routes into a single [`Router`] with CORS enabled so a
//! client served from another origin can reach the API.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /status` -- current height
/// - `GET /getSquare` -- all cells
/// - `POST /postEmoji` -- set one cell
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/status", get(handlers::get_height))
        .route("/getSquare", get(handlers::get_square))
        .route("/postEmoji", post(handlers::post_emoji))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
