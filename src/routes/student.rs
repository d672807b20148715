use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Student Router Module
///
/// Nested under `/student`. Students get a single read-only view of their own record.
pub fn student_routes() -> Router<AppState> {
    Router::new().route("/dashboard", get(handlers::student_dashboard))
}
