use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any client.
/// Reads expose only data that is public by design (places and the hash-free user
/// listing); the two POST endpoints are the identity gateway.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer
        // checks. Returns "ok" immediately to verify the service is responsive.
        .route("/health", get(|| async { "ok" }))
        // GET /places/{id}
        // Retrieves a single place by id.
        .route("/places/{id}", get(handlers::get_place_by_id))
        // GET /places/user/{uid}
        // Lists every place created by the given user; an unknown user yields an
        // empty list rather than an error.
        .route("/places/user/{uid}", get(handlers::get_places_by_user))
        // GET /users
        // Lists all registered users. The repository projection excludes the
        // password hash.
        .route("/users", get(handlers::get_users))
        // POST /users/signup
        // Multipart registration (name, email, password, image). Answers 201 with
        // an identity token on success.
        .route("/users/signup", post(handlers::signup))
        // POST /users/login
        // JSON credential check. Unknown email and wrong password share one 403
        // response shape.
        .route("/users/login", post(handlers::login))
}
