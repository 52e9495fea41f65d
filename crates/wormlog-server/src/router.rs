use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all ledger endpoints.
///
/// Record keys contain slashes, so `/audit/*key` is a catch-all.
/// `POST /audit/verify` is dispatched from the same route.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handler::health_handler))
        .route(
            "/audit",
            get(handler::list_handler).post(handler::append_handler),
        )
        .route(
            "/audit/*key",
            get(handler::get_handler)
                .delete(handler::delete_handler)
                .post(handler::post_key_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
