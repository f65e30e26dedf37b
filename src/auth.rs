use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::AppConfig, error::ApiError};

/// Claims
///
/// The payload structure carried inside every issued identity token. Claims are
/// signed with the server's shared secret and re-validated on every authenticated
/// request; nothing about a session is stored server-side, so validity is purely a
/// function of the signature and the expiry timestamp.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the UUID of the user this token asserts an identity for.
    pub sub: Uuid,
    /// The user's normalized email at issuance time.
    pub email: String,
    /// Expiration Time (exp): timestamp after which the token must not be accepted.
    pub exp: usize,
    /// Issued At (iat): timestamp when the token was created.
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Produced by the token guard
/// and consumed by handlers for every ownership check.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

/// issue_token
///
/// Signs a fresh identity token for the given user with the configured ttl. Callers
/// map the signing error to a context-appropriate server error; a failure here must
/// never be reported to the client as a credential problem.
pub fn issue_token(
    config: &AppConfig,
    user_id: Uuid,
    email: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = unix_now();
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        iat: now,
        exp: now + config.token_ttl_secs as usize,
    };

    let key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
    encode(&Header::default(), &claims, &key)
}

/// verify_token
///
/// Decodes and validates a token against the shared secret. Expiry is checked with
/// zero leeway so a token is rejected the moment it lapses. The error is returned
/// as-is for logging; the guard collapses every failure cause into one uniform
/// rejection before anything reaches the client.
pub fn verify_token(
    config: &AppConfig,
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.leeway = 0;

    decode::<Claims>(token, &decoding_key, &validation).map(|data| data.claims)
}

fn unix_now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as usize)
        .unwrap_or(0)
}

/// AuthUser Extractor Implementation
///
/// Implements Axum's FromRequestParts trait, making AuthUser usable as a function
/// argument in any authenticated handler. This cleanly separates authentication
/// (middleware/extractor) from business logic (the handler).
///
/// The process involves:
/// 1. Cache check: the auth middleware stores the resolved identity in request
///    extensions, so handlers behind it do not verify twice.
/// 2. Token extraction: standard `Authorization: Bearer <token>` header parsing.
/// 3. Token validation: signature and expiry via the Token Service.
///
/// Rejection: ApiError::AccessDenied (401) on any failure, with one uniform body.
/// The extractor never distinguishes "no token" from "bad token" from "expired
/// token" in its response.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    // Allows the extractor to pull the AppConfig (for the signing secret).
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // 1. Cache Check
        // The route-level guard middleware has usually run already and parked the
        // identity in extensions; reuse it instead of re-verifying the token.
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let config = AppConfig::from_ref(state);

        // 2. Token Extraction
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::AccessDenied)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::AccessDenied)?;

        // 3. Decode and Validate
        let claims = verify_token(&config, token).map_err(|e| {
            tracing::debug!("token verification failed: {:?}", e.kind());
            ApiError::AccessDenied
        })?;

        Ok(AuthUser {
            id: claims.sub,
            email: claims.email,
        })
    }
}
