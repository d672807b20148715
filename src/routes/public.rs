use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints reachable without a session, plus `/redirect`, which only needs *a* session
/// and is therefore the one route here the access table guards.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers. Returns "ok" immediately.
        .route("/health", get(|| async { "ok" }))
        // GET/POST /login
        // The login view, and the form post that runs the authentication gate.
        .route("/login", get(handlers::login_page).post(handlers::login))
        // GET /logout
        // Expires the session cookie.
        .route("/logout", get(handlers::logout))
        // GET /redirect
        // Post-login landing: sends the principal to its role's dashboard.
        .route("/redirect", get(handlers::redirect_after_login))
}
