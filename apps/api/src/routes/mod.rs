pub mod health;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::jobs::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    // The open endpoint is called straight from browsers, preflight included.
    let open_search = Router::new()
        .route(
            "/api/v1/jobs/search/open",
            get(handlers::handle_open_search_query).post(handlers::handle_open_search_body),
        )
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/jobs/search", post(handlers::handle_search))
        .route(
            "/api/v1/jobs/smart-search",
            post(handlers::handle_smart_search),
        )
        .route("/api/v1/jobs/history", get(handlers::handle_list_history))
        .route(
            "/api/v1/jobs/history/delete",
            post(handlers::handle_delete_history),
        )
        .merge(open_search)
        .with_state(state)
}
