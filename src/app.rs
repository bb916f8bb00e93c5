use crate::handlers;
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/stats",
            get(handlers::list_activities).post(handlers::save_activities),
        )
        .route("/api/dashboard/stats", get(handlers::dashboard_stats))
        .route("/report", get(handlers::report))
        .with_state(state)
}
