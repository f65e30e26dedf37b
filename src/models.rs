use axum::body::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The canonical identity record stored in the `users` table. Carries the owned-place
/// reference set (`place_ids`), which is only ever mutated inside the same transaction
/// that inserts or deletes the corresponding place row.
///
/// The password hash is deliberately excluded from serialization so the full record
/// can never leak a credential even if it is handed to a response by mistake.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    // Normalized (trimmed, lowercased) before every read or write.
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    // Artifact key of the profile image, e.g. "uploads/images/<uuid>.png".
    pub image: String,
    // Owned-place reference set. Mirrors the `creator` column on places.
    pub place_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// UserSummary
///
/// The projection of a user exposed by the public listing endpoint. The repository
/// query never selects the password hash, so this struct cannot carry it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub image: String,
    pub place_ids: Vec<Uuid>,
}

/// Coordinates
///
/// A resolved latitude/longitude pair produced by the geocoding adapter and stored
/// flat on the places table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Place
///
/// A point-of-interest record from the `places` table. Invariant: `creator` always
/// names an existing user, and that user's `place_ids` contains this place's id for
/// as long as the row exists. The `lat`/`lng` columns are flattened into the nested
/// `location` object on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Place {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    // The raw address string as submitted; `location` holds its resolution.
    pub address: String,
    #[sqlx(flatten)]
    pub location: Coordinates,
    // Artifact key of the place image.
    pub image: String,
    // FK to users.id (Owner).
    pub creator: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Repository Input Records ---

/// NewUser
///
/// Input record for user insertion. The id and timestamps are generated by the
/// repository; the password arrives already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub image: String,
}

/// NewPlace
///
/// Input record for the transactional place insertion. The address has already been
/// geocoded and the image already staged by the time this is constructed.
#[derive(Debug, Clone)]
pub struct NewPlace {
    pub title: String,
    pub description: String,
    pub address: String,
    pub location: Coordinates,
    pub image: String,
    pub creator: Uuid,
}

// --- Request Payloads (Input Schemas) ---

/// ImagePart
///
/// The raw image file extracted from a multipart request, handed to the artifact
/// store for staging. The content type decides the stored file extension.
#[derive(Debug, Clone)]
pub struct ImagePart {
    pub content_type: String,
    pub data: Bytes,
}

/// PlaceSubmission
///
/// Parsed multipart payload for POST /places.
#[derive(Debug, Clone)]
pub struct PlaceSubmission {
    pub title: String,
    pub description: String,
    pub address: String,
    pub image: ImagePart,
}

impl PlaceSubmission {
    /// Mirrors the input-shape gate applied ahead of the core logic: non-empty title,
    /// description of at least 5 characters, non-empty address.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.title.trim().is_empty()
            || self.description.chars().count() < 5
            || self.address.trim().is_empty()
        {
            return Err(ApiError::Validation("Invalid input data.".to_string()));
        }
        Ok(())
    }
}

/// SignupSubmission
///
/// Parsed multipart payload for POST /users/signup. The email is normalized by the
/// handler before any lookup or insert.
#[derive(Debug, Clone)]
pub struct SignupSubmission {
    pub name: String,
    pub email: String,
    pub password: String,
    pub image: ImagePart,
}

impl SignupSubmission {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty()
            || !is_valid_email(&self.email)
            || self.password.chars().count() < 6
        {
            return Err(ApiError::Validation("Invalid input data.".to_string()));
        }
        Ok(())
    }
}

/// LoginRequest
///
/// JSON payload for POST /users/login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// UpdatePlaceRequest
///
/// JSON payload for PATCH /places/{id}. Only the title and description of a place
/// are mutable; address, coordinates, and image are fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePlaceRequest {
    pub title: String,
    pub description: String,
}

impl UpdatePlaceRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.title.trim().is_empty() || self.description.chars().count() < 5 {
            return Err(ApiError::Validation("Invalid input data.".to_string()));
        }
        Ok(())
    }
}

// --- Response Schemas (Output) ---

/// AuthResponse
///
/// Output schema for signup and login. `userId` is camel-cased on the wire for the
/// frontend; the token is the signed identity credential.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AuthResponse {
    #[serde(rename = "userId")]
    #[ts(rename = "userId")]
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
}

/// PlaceResponse
///
/// Single-place envelope, `{ "place": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PlaceResponse {
    pub place: Place,
}

/// PlacesResponse
///
/// Place-list envelope, `{ "places": [...] }`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PlacesResponse {
    pub places: Vec<Place>,
}

/// UsersResponse
///
/// User-list envelope, `{ "users": [...] }`. Uses the hash-free projection.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UsersResponse {
    pub users: Vec<UserSummary>,
}

/// MessageResponse
///
/// The uniform `{ "message": ... }` body used for delete confirmations and for
/// every error response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

// --- Helpers ---

/// normalize_email
///
/// Canonical email form used for every lookup and write: surrounding whitespace
/// stripped, lowercased. Applied at signup and login so the uniqueness check and
/// the credential lookup agree on the key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// is_valid_email
///
/// Minimal well-formedness gate: exactly one '@', non-empty local part, and a
/// domain containing a dot. Deliberately loose; the source of truth for identity
/// is the confirmation the user can log in, not RFC 5322.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    let mut parts = email.splitn(2, '@');
    let (Some(local), Some(domain)) = (parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}
