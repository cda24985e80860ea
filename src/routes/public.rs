use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints any client may call without a token. Mounted under `/api/v1`.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // POST /auth/register
        // Creates a parent or educator account and returns a bearer token.
        .route("/auth/register", post(handlers::register_user))
        // POST /auth/login
        .route("/auth/login", post(handlers::login))
        // GET /materials?type=...&gradeLevel=...&search=...&limit=...&offset=...
        // Filtered, searched and paginated catalog listing.
        .route("/materials", get(handlers::list_materials))
        // GET /materials/{id}
        .route("/materials/{id}", get(handlers::get_material))
        // POST /materials/{id}/download
        // Counts the download and returns the file location.
        .route("/materials/{id}/download", post(handlers::download_material))
        // GET /stats
        // Totals and per-grade breakdown, computed from live data.
        .route("/stats", get(handlers::get_stats))
}

/// Unversioned service endpoints mounted at the root.
pub fn service_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::root))
        // GET /health
        // Liveness probe for load balancers and container orchestration.
        .route("/health", get(handlers::health))
}
