use axum::body::Bytes;
use chrono::Utc;
use roamer_api::models::{
    AuthResponse, Coordinates, ImagePart, Place, PlaceSubmission, SignupSubmission,
    UpdatePlaceRequest, User, is_valid_email, normalize_email,
};
use uuid::Uuid;

fn png_image() -> ImagePart {
    ImagePart {
        content_type: "image/png".to_string(),
        data: Bytes::from_static(b"png bytes"),
    }
}

// --- Serialization Shapes ---

#[test]
fn test_user_serialization_never_includes_password_hash() {
    let user = User {
        id: Uuid::new_v4(),
        name: "Alice".to_string(),
        email: "alice@example.com".to_string(),
        password_hash: "$2b$12$abcdefghijklmnopqrstuv".to_string(),
        image: "uploads/images/a.png".to_string(),
        place_ids: vec![],
        created_at: Utc::now(),
    };

    let json_output = serde_json::to_string(&user).unwrap();
    assert!(!json_output.contains("password"));
    assert!(!json_output.contains("$2b$12$"));
}

#[test]
fn test_place_serializes_nested_location() {
    let place = Place {
        id: Uuid::new_v4(),
        title: "Eiffel Tower".to_string(),
        description: "Tower".to_string(),
        address: "Champ de Mars, Paris".to_string(),
        location: Coordinates {
            lat: 48.8582,
            lng: 2.2945,
        },
        image: "uploads/images/a.png".to_string(),
        creator: Uuid::new_v4(),
        created_at: Utc::now(),
    };

    let value: serde_json::Value = serde_json::to_value(&place).unwrap();
    assert_eq!(value["location"]["lat"], 48.8582);
    assert_eq!(value["location"]["lng"], 2.2945);
}

#[test]
fn test_auth_response_uses_camel_cased_user_id() {
    let response = AuthResponse {
        user_id: Uuid::new_v4(),
        email: "alice@example.com".to_string(),
        token: "a.b.c".to_string(),
    };

    let json_output = serde_json::to_string(&response).unwrap();
    assert!(json_output.contains(r#""userId""#));
    assert!(!json_output.contains("user_id"));
}

// --- Input Validation ---

#[test]
fn test_place_submission_validation() {
    let valid = PlaceSubmission {
        title: "Eiffel Tower".to_string(),
        description: "A long enough description".to_string(),
        address: "Champ de Mars, Paris".to_string(),
        image: png_image(),
    };
    assert!(valid.validate().is_ok());

    let mut empty_title = valid.clone();
    empty_title.title = "   ".to_string();
    assert!(empty_title.validate().is_err());

    let mut short_description = valid.clone();
    short_description.description = "tiny".to_string();
    assert!(short_description.validate().is_err());

    let mut empty_address = valid;
    empty_address.address = String::new();
    assert!(empty_address.validate().is_err());
}

#[test]
fn test_update_request_validation() {
    let valid = UpdatePlaceRequest {
        title: "New title".to_string(),
        description: "Long enough".to_string(),
    };
    assert!(valid.validate().is_ok());

    let short = UpdatePlaceRequest {
        title: "New title".to_string(),
        description: "abc".to_string(),
    };
    assert!(short.validate().is_err());
}

#[test]
fn test_signup_submission_validation() {
    let valid = SignupSubmission {
        name: "Alice".to_string(),
        email: "alice@example.com".to_string(),
        password: "secret-password".to_string(),
        image: png_image(),
    };
    assert!(valid.validate().is_ok());

    let mut bad_email = valid.clone();
    bad_email.email = "not-an-email".to_string();
    assert!(bad_email.validate().is_err());

    let mut short_password = valid.clone();
    short_password.password = "12345".to_string();
    assert!(short_password.validate().is_err());

    let mut blank_name = valid;
    blank_name.name = " ".to_string();
    assert!(blank_name.validate().is_err());
}

// --- Helpers ---

#[test]
fn test_normalize_email() {
    assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    assert_eq!(normalize_email("bob@example.com"), "bob@example.com");
}

#[test]
fn test_is_valid_email() {
    assert!(is_valid_email("alice@example.com"));
    assert!(is_valid_email("a.b+c@sub.example.co"));

    assert!(!is_valid_email("alice"));
    assert!(!is_valid_email("alice@"));
    assert!(!is_valid_email("@example.com"));
    assert!(!is_valid_email("alice@nodot"));
    assert!(!is_valid_email("alice@.com"));
    assert!(!is_valid_email("a b@example.com"));
    assert!(!is_valid_email("a@b@example.com"));
}
