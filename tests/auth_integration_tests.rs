use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::FromRequestParts,
    http::{Method, Request, Uri, header, request::Parts},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use roamer_api::{
    auth::{AuthUser, Claims, issue_token, verify_token},
    config::AppConfig,
    error::ApiError,
};
use uuid::Uuid;

// --- Helper Functions ---

const TEST_USER_ID: Uuid = Uuid::from_u128(1);
const TEST_EMAIL: &str = "test@example.com";

fn test_config() -> AppConfig {
    AppConfig::default()
}

/// Builds a token with an arbitrary expiry offset (seconds relative to now; may be
/// negative to produce an already-expired token).
fn create_token(config: &AppConfig, user_id: Uuid, exp_offset: i64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: user_id,
        email: TEST_EMAIL.to_string(),
        iat: now as usize,
        exp: (now + exp_offset) as usize,
    };

    let key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

/// Helper to get the mutable Parts struct from a generated Request.
fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

// --- Token Service Tests ---

#[test]
fn test_issue_and_verify_roundtrip() {
    let config = test_config();
    let token = issue_token(&config, TEST_USER_ID, TEST_EMAIL).unwrap();

    let claims = verify_token(&config, &token).expect("fresh token must verify");
    assert_eq!(claims.sub, TEST_USER_ID);
    assert_eq!(claims.email, TEST_EMAIL);
    assert_eq!(claims.exp, claims.iat + config.token_ttl_secs as usize);
}

#[test]
fn test_verify_accepts_token_just_before_expiry() {
    let config = test_config();
    // Two seconds of validity left.
    let token = create_token(&config, TEST_USER_ID, 2);
    assert!(verify_token(&config, &token).is_ok());
}

#[test]
fn test_verify_rejects_expired_token() {
    let config = test_config();
    // Expired ten seconds ago; zero leeway means this must fail.
    let token = create_token(&config, TEST_USER_ID, -10);
    assert!(verify_token(&config, &token).is_err());
}

#[test]
fn test_verify_rejects_wrong_secret() {
    let config = test_config();
    let token = issue_token(&config, TEST_USER_ID, TEST_EMAIL).unwrap();

    let mut other = test_config();
    other.jwt_secret = "a-completely-different-secret".to_string();
    assert!(verify_token(&other, &token).is_err());
}

#[test]
fn test_verify_rejects_garbage() {
    let config = test_config();
    assert!(verify_token(&config, "not.a.token").is_err());
    assert!(verify_token(&config, "").is_err());
}

// --- Guard (Extractor) Tests ---

#[tokio::test]
async fn test_guard_accepts_valid_bearer_token() {
    let config = test_config();
    let token = issue_token(&config, TEST_USER_ID, TEST_EMAIL).unwrap();

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &config).await;

    assert!(auth_user.is_ok());
    let user = auth_user.unwrap();
    assert_eq!(user.id, TEST_USER_ID);
    assert_eq!(user.email, TEST_EMAIL);
}

#[tokio::test]
async fn test_guard_rejects_missing_header() {
    let config = test_config();
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    let auth_user = AuthUser::from_request_parts(&mut parts, &config).await;

    assert!(auth_user.is_err());
    assert_eq!(auth_user.unwrap_err(), ApiError::AccessDenied);
}

#[tokio::test]
async fn test_guard_rejects_non_bearer_scheme() {
    let config = test_config();
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_static("Basic dXNlcjpwYXNz"),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &config).await;
    assert_eq!(auth_user.unwrap_err(), ApiError::AccessDenied);
}

#[tokio::test]
async fn test_guard_rejects_expired_token_uniformly() {
    let config = test_config();
    let token = create_token(&config, TEST_USER_ID, -10);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &config).await;

    // Same rejection as a missing or malformed token: the guard does not say why.
    assert_eq!(auth_user.unwrap_err(), ApiError::AccessDenied);
}

#[tokio::test]
async fn test_guard_reuses_cached_identity_from_extensions() {
    let config = test_config();
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.extensions.insert(AuthUser {
        id: TEST_USER_ID,
        email: TEST_EMAIL.to_string(),
    });

    // No Authorization header at all; the middleware-parked identity wins.
    let auth_user = AuthUser::from_request_parts(&mut parts, &config).await;
    assert_eq!(auth_user.unwrap().id, TEST_USER_ID);
}
