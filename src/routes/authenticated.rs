use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, patch, post},
};

/// Authenticated Router Module
///
/// Defines the routes that require a verified bearer token. The guard middleware
/// layered above this module rejects any request without one (OPTIONS excepted),
/// so every handler here can rely on a resolved request identity.
///
/// Ownership is a second, separate check: mutating a specific place additionally
/// requires the acting user to be its recorded creator, enforced inside the
/// handlers against the loaded record.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /places
        // Multipart submission of a new place (title, description, address, image).
        // Runs the geocode-then-transact create flow.
        .route("/places", post(handlers::create_place))
        // PATCH/DELETE /places/{id}
        // Owner-only mutation of an existing place. PATCH edits title/description;
        // DELETE runs the transactional removal and releases the image afterwards.
        .route(
            "/places/{id}",
            patch(handlers::update_place).delete(handlers::delete_place),
        )
}
