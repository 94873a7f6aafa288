use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Leave room for a file part above the upload limit to be drained and flagged
    // instead of failing the whole body.
    let body_limit = (state.config.max_upload_size as usize)
        .saturating_mul(2)
        .saturating_add(64 * 1024);

    let mut router = Router::new()
        // Paintings
        .route("/paintings", get(handlers::list_paintings))
        .route(
            "/paintings",
            post(handlers::create_painting).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/paintings/:id", delete(handlers::delete_painting))
        .route("/paintings/:id", get(handlers::get_painting))
        .route(
            "/paintings/:id",
            put(handlers::update_painting).layer(DefaultBodyLimit::max(body_limit)),
        )
        // Rubrics
        .route("/rubrics", get(handlers::list_rubrics))
        .route("/rubrics", post(handlers::create_rubric))
        // Internal
        .route("/_internal/health", get(handlers::health));

    // Test-only routes
    if state.config.test_mode {
        tracing::warn!("Test mode enabled, purge route is available.");
        router = router.route("/admin/purge", delete(handlers::admin_purge));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
