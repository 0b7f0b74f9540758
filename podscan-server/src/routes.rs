use axum::{Router, routing::post};
use tower_http::trace::TraceLayer;

use crate::{AppState, handlers::receive_result_handler};

/// The callback surface scan jobs post to.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/result/", post(receive_result_handler))
        .route("/result/{*rest}", post(receive_result_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
