use axum::{
    Router,
    extract::{FromRef, FromRequestParts, Request},
    http::{HeaderName, Method},
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod geocode;
pub mod handlers;
pub mod models;
pub mod password;
pub mod repository;
pub mod storage;

// Module for routing segregation (Public, Authenticated).
pub mod routes;
use auth::AuthUser;
use error::ApiError;
use routes::{authenticated, public};

// --- Public Re-exports ---

// Makes core state types easily accessible to the application entry point (main.rs).
pub use config::AppConfig;
pub use geocode::{GeocoderState, MockGeocoder, NominatimGeocoder};
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{ArtifactState, DiskArtifactStore, MockArtifactStore};

/// ApiDoc
///
/// Auto-generates the OpenAPI documentation (Swagger JSON) for the application by
/// aggregating every handler decorated with `#[utoipa::path]` and every schema
/// decorated with `#[derive(utoipa::ToSchema)]`. The resulting JSON is served at
/// `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_place_by_id, handlers::get_places_by_user, handlers::create_place,
        handlers::update_place, handlers::delete_place, handlers::get_users,
        handlers::signup, handlers::login,
    ),
    components(
        schemas(
            models::Place, models::Coordinates, models::UserSummary, models::LoginRequest,
            models::UpdatePlaceRequest, models::AuthResponse, models::PlaceResponse,
            models::PlacesResponse, models::UsersResponse, models::MessageResponse,
        )
    ),
    tags(
        (name = "roamer", description = "Points-of-interest sharing API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, thread-safe, immutable container holding every application service
/// and the configuration, shared across all incoming requests.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: the users/places persistence behind the trait boundary.
    pub repo: RepositoryState,
    /// Artifact Layer: staging and release of uploaded images.
    pub storage: ArtifactState,
    /// Geocoding Layer: address resolution behind the capability boundary.
    pub geocoder: GeocoderState,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// These implementations allow extractors and handlers to selectively pull
// components from the shared AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for ArtifactState {
    fn from_ref(app_state: &AppState) -> ArtifactState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for GeocoderState {
    fn from_ref(app_state: &AppState) -> GeocoderState {
        app_state.geocoder.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// The route-level guard for the authenticated router. It verifies the bearer token
/// via the `AuthUser` extractor and parks the resolved identity in request
/// extensions for the handlers downstream.
///
/// Preflight (`OPTIONS`) requests bypass the guard unconditionally; they carry no
/// credentials by design and must succeed for browsers to attempt the real call.
/// Every other failure is rejected with the extractor's uniform 401 body before the
/// handler runs.
pub async fn auth_middleware(
    axum::extract::State(state): axum::extract::State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if request.method() == Method::OPTIONS {
        return Ok(next.run(request).await);
    }

    let (mut parts, body) = request.into_parts();
    let auth_user = AuthUser::from_request_parts(&mut parts, &state).await?;

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// create_router
///
/// Assembles the application's entire routing structure, applies global and scoped
/// middleware, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: no guard applied.
        .merge(public::public_routes())
        // Authenticated Routes: protected by the bearer-token guard.
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        // Static serving for uploaded images, the fixed prefix place/user records
        // reference their artifacts under.
        .nest_service("/uploads/images", ServeDir::new(&state.config.upload_dir))
        // Uniform 404 body for unmatched routes.
        .fallback(handlers::route_not_found)
        // Apply the Unified State to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers (Applied outermost/first)
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a unique UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: wraps the request/response lifecycle in a span
                // carrying the generated request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: return the x-request-id header to the
                // client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Customizes the TraceLayer span so every log line for a single request is
/// correlated by its request id alongside the HTTP method and URI.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
