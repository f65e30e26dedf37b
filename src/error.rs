use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{geocode::GeocodeError, models::MessageResponse, storage::UploadError};

/// ApiError
///
/// The single user-facing error taxonomy. Every component-level failure is translated
/// into one of these variants at the handler boundary, and each variant renders as a
/// `{ "message": ... }` JSON body with its status code. Internal detail (database
/// errors, signing-library errors) is logged at the failing call site and never
/// reaches the client.
#[derive(Debug, Error, PartialEq)]
pub enum ApiError {
    /// Request body failed input-shape validation (400).
    #[error("{0}")]
    Validation(String),

    /// Uploaded file was rejected before staging (unsupported type or size, 400).
    #[error("{0}")]
    UploadRejected(String),

    /// The bearer token was missing, malformed, or failed verification (401).
    /// One uniform message for every cause; the guard must not reveal whether the
    /// failure was "no token", "bad token", or "expired token".
    #[error("Access denied.")]
    AccessDenied,

    /// The acting user is not the recorded owner of the resource (401).
    #[error("You are not authorized to modify this place.")]
    NotOwner,

    /// Login rejected (403). Unknown email and wrong password share this variant so
    /// the response carries no account-enumeration signal.
    #[error("Invalid credentials, please check your credentials and try again.")]
    InvalidCredentials,

    /// The requested resource does not exist (404).
    #[error("{0}")]
    NotFound(String),

    /// A uniqueness rule was violated, e.g. duplicate signup email (422).
    #[error("{0}")]
    Conflict(String),

    /// The geocoding provider answered but found nothing for the address (422).
    #[error("Could not find location for the specified address.")]
    AddressUnresolvable,

    /// The geocoding provider could not be reached or answered garbage (502).
    #[error("The location service is currently unavailable, please try again later.")]
    GeocoderUnavailable,

    /// Generic server-side failure (500). The stored message is already the
    /// user-facing phrasing; the underlying cause was logged where it happened.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Maps each variant to its HTTP status code.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::UploadRejected(_) => StatusCode::BAD_REQUEST,
            ApiError::AccessDenied | ApiError::NotOwner => StatusCode::UNAUTHORIZED,
            ApiError::InvalidCredentials => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) | ApiError::AddressUnresolvable => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::GeocoderUnavailable => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = MessageResponse {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<GeocodeError> for ApiError {
    fn from(err: GeocodeError) -> Self {
        match err {
            GeocodeError::Unresolvable => ApiError::AddressUnresolvable,
            GeocodeError::Provider(_) => ApiError::GeocoderUnavailable,
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::UnsupportedType => {
                ApiError::UploadRejected("Invalid image format.".to_string())
            }
            UploadError::TooLarge => {
                ApiError::UploadRejected("The uploaded file is too large.".to_string())
            }
            UploadError::Io(_) => ApiError::Internal(
                "Could not store the uploaded image, please try again later.".to_string(),
            ),
        }
    }
}
