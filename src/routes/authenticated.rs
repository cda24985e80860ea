use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Every route here requires a valid bearer token. The caller's identity is
/// resolved by the `AuthUser` layer applied in `create_router`; per-role
/// rules (only educators submit) are enforced inside the handlers.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /auth/logout
        // Acknowledges sign-out. Tokens are not revoked server-side.
        .route("/auth/logout", post(handlers::logout))
        // GET /users/me
        .route("/users/me", get(handlers::get_me))
        // POST /materials
        // Educators submit a new material. Parents receive 403.
        .route("/materials", post(handlers::submit_material))
        // POST /materials/{id}/like
        .route("/materials/{id}/like", post(handlers::like_material))
}
