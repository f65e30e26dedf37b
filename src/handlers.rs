use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::{AuthUser, issue_token},
    error::ApiError,
    models::{
        AuthResponse, ImagePart, LoginRequest, MessageResponse, NewPlace, NewUser, Place,
        PlaceResponse, PlaceSubmission, PlacesResponse, SignupSubmission, UpdatePlaceRequest, User,
        UsersResponse, normalize_email,
    },
    password::{HASH_COST, hash_password, verify_password},
    repository::RepoError,
};

// --- Multipart Parsing ---

/// Collected multipart fields, before they are shaped into a typed submission.
#[derive(Default)]
struct MultipartFields {
    text: Vec<(String, String)>,
    image: Option<ImagePart>,
}

/// read_multipart_fields
///
/// Drains a multipart body into text fields plus the single `image` file part.
/// Any transport-level multipart failure is reported as a 400; the core logic
/// downstream never sees a half-parsed body.
async fn read_multipart_fields(multipart: &mut Multipart) -> Result<MultipartFields, ApiError> {
    let invalid = |_| ApiError::Validation("Invalid input data.".to_string());

    let mut fields = MultipartFields::default();
    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == "image" {
            let content_type = field.content_type().unwrap_or_default().to_string();
            let data = field.bytes().await.map_err(invalid)?;
            fields.image = Some(ImagePart { content_type, data });
        } else {
            let value = field.text().await.map_err(invalid)?;
            fields.text.push((name, value));
        }
    }
    Ok(fields)
}

impl MultipartFields {
    fn take_text(&mut self, name: &str) -> Result<String, ApiError> {
        let index = self
            .text
            .iter()
            .position(|(key, _)| key == name)
            .ok_or_else(|| ApiError::Validation("Invalid input data.".to_string()))?;
        Ok(self.text.swap_remove(index).1)
    }

    fn take_image(&mut self) -> Result<ImagePart, ApiError> {
        self.image
            .take()
            .ok_or_else(|| ApiError::Validation("Invalid input data.".to_string()))
    }
}

async fn read_place_submission(multipart: &mut Multipart) -> Result<PlaceSubmission, ApiError> {
    let mut fields = read_multipart_fields(multipart).await?;
    Ok(PlaceSubmission {
        title: fields.take_text("title")?,
        description: fields.take_text("description")?,
        address: fields.take_text("address")?,
        image: fields.take_image()?,
    })
}

async fn read_signup_submission(multipart: &mut Multipart) -> Result<SignupSubmission, ApiError> {
    let mut fields = read_multipart_fields(multipart).await?;
    Ok(SignupSubmission {
        name: fields.take_text("name")?,
        email: fields.take_text("email")?,
        password: fields.take_text("password")?,
        image: fields.take_image()?,
    })
}

// --- Place Handlers ---

/// get_place_by_id
///
/// [Public Route] Retrieves a single place by id.
#[utoipa::path(
    get,
    path = "/places/{id}",
    params(("id" = Uuid, Path, description = "Place ID")),
    responses(
        (status = 200, description = "Found", body = PlaceResponse),
        (status = 404, description = "No place with that id")
    )
)]
pub async fn get_place_by_id(
    State(state): State<AppState>,
    Path(place_id): Path<Uuid>,
) -> Result<Json<PlaceResponse>, ApiError> {
    let place = state
        .repo
        .get_place(place_id)
        .await
        .map_err(|_| {
            ApiError::Internal("Something went wrong, could not find a place.".to_string())
        })?
        .ok_or_else(|| {
            ApiError::NotFound("Could not find a place for the provided id.".to_string())
        })?;

    Ok(Json(PlaceResponse { place }))
}

/// get_places_by_user
///
/// [Public Route] Lists every place created by the given user. An unknown user id
/// simply yields an empty list.
#[utoipa::path(
    get,
    path = "/places/user/{uid}",
    params(("uid" = Uuid, Path, description = "User ID")),
    responses((status = 200, description = "Places owned by the user", body = PlacesResponse))
)]
pub async fn get_places_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<PlacesResponse>, ApiError> {
    let places = state
        .repo
        .get_places_for_user(user_id)
        .await
        .map_err(|_| {
            ApiError::Internal("Something went wrong, could not find a place.".to_string())
        })?;

    Ok(Json(PlacesResponse { places }))
}

/// create_place
///
/// [Authenticated Route] Registers a new place for the requesting user. The
/// multipart body carries title, description, address, and the image file; the
/// heavy lifting happens in `perform_create_place`.
#[utoipa::path(
    post,
    path = "/places",
    responses(
        (status = 201, description = "Created", body = PlaceResponse),
        (status = 400, description = "Invalid input or rejected upload"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Owner not found"),
        (status = 422, description = "Address could not be resolved")
    )
)]
pub async fn create_place(
    auth: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<PlaceResponse>), ApiError> {
    let submission = read_place_submission(&mut multipart).await?;
    submission.validate()?;

    let place = perform_create_place(&state, auth.id, submission).await?;
    Ok((StatusCode::CREATED, Json(PlaceResponse { place })))
}

/// perform_create_place
///
/// The create flow of the consistency core, in its mandatory order:
/// 1. stage the uploaded image (resource acquisition);
/// 2. resolve the owner to an existing user;
/// 3. geocode the address;
/// 4. insert the place and append it to the owner's place set in one transaction.
///
/// Steps 2 onward run inside a single fallible block: whichever of them fails, the
/// staged artifact is released before the error propagates, so no failure path can
/// leak a file that nothing references.
pub async fn perform_create_place(
    state: &AppState,
    creator: Uuid,
    submission: PlaceSubmission,
) -> Result<Place, ApiError> {
    let image = state
        .storage
        .stage(&submission.image.content_type, submission.image.data.clone())
        .await?;

    match resolve_and_insert_place(state, creator, &submission, &image).await {
        Ok(place) => Ok(place),
        Err(err) => {
            // Cleanup-on-failure: mandatory on every exit path once staging succeeded.
            state.storage.release(&image).await;
            Err(err)
        }
    }
}

async fn resolve_and_insert_place(
    state: &AppState,
    creator: Uuid,
    submission: &PlaceSubmission,
    image: &str,
) -> Result<Place, ApiError> {
    let owner = state
        .repo
        .get_user(creator)
        .await
        .map_err(|_| {
            ApiError::Internal("Failed to create a place, please try again later.".to_string())
        })?
        .ok_or_else(|| {
            ApiError::NotFound("Could not find user for the provided userId.".to_string())
        })?;

    let location = state.geocoder.geocode(&submission.address).await?;

    let place = state
        .repo
        .create_place(NewPlace {
            title: submission.title.clone(),
            description: submission.description.clone(),
            address: submission.address.clone(),
            location,
            image: image.to_string(),
            creator: owner.id,
        })
        .await
        .map_err(|e| match e {
            RepoError::OwnerMissing => {
                ApiError::NotFound("Could not find user for the provided userId.".to_string())
            }
            _ => ApiError::Internal("Failed to create a place, please try again later.".to_string()),
        })?;

    Ok(place)
}

/// update_place
///
/// [Authenticated Route] Edits the title and description of an owned place. This is
/// a single-record mutation; the owner's place set is untouched, so no cross-record
/// transaction is involved.
///
/// *Authorization*: the acting user must be the place's recorded creator.
#[utoipa::path(
    patch,
    path = "/places/{id}",
    params(("id" = Uuid, Path, description = "Place ID")),
    request_body = UpdatePlaceRequest,
    responses(
        (status = 200, description = "Updated", body = PlaceResponse),
        (status = 401, description = "Not the owner"),
        (status = 404, description = "No place with that id")
    )
)]
pub async fn update_place(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(place_id): Path<Uuid>,
    Json(payload): Json<UpdatePlaceRequest>,
) -> Result<Json<PlaceResponse>, ApiError> {
    payload.validate()?;

    let place = state
        .repo
        .get_place(place_id)
        .await
        .map_err(|_| {
            ApiError::Internal("Something went wrong, could not update place.".to_string())
        })?
        .ok_or_else(|| {
            ApiError::NotFound("Could not find place for the provided id.".to_string())
        })?;

    if place.creator != auth.id {
        return Err(ApiError::NotOwner);
    }

    let updated = state
        .repo
        .update_place(place_id, payload)
        .await
        .map_err(|_| {
            ApiError::Internal("Something went wrong, could not update place.".to_string())
        })?
        .ok_or_else(|| {
            ApiError::NotFound("Could not find place for the provided id.".to_string())
        })?;

    Ok(Json(PlaceResponse { place: updated }))
}

/// delete_place
///
/// [Authenticated Route] Removes an owned place. The flow's order is load-bearing:
/// 1. resolve the place (404 when absent);
/// 2. ownership check (401 on mismatch, distinct from 404);
/// 3. transaction: delete the row and remove the id from the owner's place set;
/// 4. only after the commit, release the image artifact.
///
/// Releasing after commit means a failed transaction can never leave a surviving
/// record pointing at a deleted file. A crash between commit and release leaves at
/// worst an orphaned file, which an out-of-band sweep can reclaim.
#[utoipa::path(
    delete,
    path = "/places/{id}",
    params(("id" = Uuid, Path, description = "Place ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 401, description = "Not the owner"),
        (status = 404, description = "No place with that id")
    )
)]
pub async fn delete_place(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(place_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let place = state
        .repo
        .get_place(place_id)
        .await
        .map_err(|_| {
            ApiError::Internal("Something went wrong, could not delete place.".to_string())
        })?
        .ok_or_else(|| {
            ApiError::NotFound("Could not find place for the provided id.".to_string())
        })?;

    if place.creator != auth.id {
        return Err(ApiError::NotOwner);
    }

    state.repo.delete_place(&place).await.map_err(|_| {
        ApiError::Internal("Something went wrong, could not delete place.".to_string())
    })?;

    // The transaction is committed; the artifact is now unreferenced.
    state.storage.release(&place.image).await;

    Ok(Json(MessageResponse {
        message: "The place has been deleted.".to_string(),
    }))
}

// --- User Handlers ---

/// get_users
///
/// [Public Route] Lists every registered user. The repository projection excludes
/// the password hash, so this endpoint cannot leak credentials.
#[utoipa::path(
    get,
    path = "/users",
    responses((status = 200, description = "All users", body = UsersResponse))
)]
pub async fn get_users(State(state): State<AppState>) -> Result<Json<UsersResponse>, ApiError> {
    let users = state.repo.list_users().await.map_err(|_| {
        ApiError::Internal("Unable to fetch users, please try again later.".to_string())
    })?;

    Ok(Json(UsersResponse { users }))
}

/// signup
///
/// [Public Route] Registers a new user from a multipart body (name, email,
/// password, image) and answers with a fresh identity token.
#[utoipa::path(
    post,
    path = "/users/signup",
    responses(
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 400, description = "Invalid input or rejected upload"),
        (status = 422, description = "Email already registered")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let submission = read_signup_submission(&mut multipart).await?;
    submission.validate()?;

    let response = perform_signup(&state, submission).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// perform_signup
///
/// The signup flow: normalize the email, stage the profile image, then run the
/// fallible chain (duplicate check, hash, insert). Any failure in that chain
/// releases the staged artifact, since no record references it yet. Token issuance
/// happens after the insert; if signing fails at that point the user record exists
/// and still references the image, so the artifact is kept and a server error is
/// surfaced.
pub async fn perform_signup(
    state: &AppState,
    submission: SignupSubmission,
) -> Result<AuthResponse, ApiError> {
    let email = normalize_email(&submission.email);

    let image = state
        .storage
        .stage(&submission.image.content_type, submission.image.data.clone())
        .await?;

    let user = match insert_new_user(state, &submission, &email, &image).await {
        Ok(user) => user,
        Err(err) => {
            state.storage.release(&image).await;
            return Err(err);
        }
    };

    let token = issue_token(&state.config, user.id, &user.email).map_err(|e| {
        tracing::error!("token signing failed during signup: {:?}", e);
        ApiError::Internal("Could not register user, please try again later.".to_string())
    })?;

    Ok(AuthResponse {
        user_id: user.id,
        email: user.email,
        token,
    })
}

async fn insert_new_user(
    state: &AppState,
    submission: &SignupSubmission,
    email: &str,
    image: &str,
) -> Result<User, ApiError> {
    let registration_failed =
        || ApiError::Internal("Could not register user, please try again later.".to_string());

    let existing = state
        .repo
        .find_user_by_email(email)
        .await
        .map_err(|_| registration_failed())?;
    if existing.is_some() {
        return Err(ApiError::Conflict("User already exists.".to_string()));
    }

    let password_hash = hash_password(&submission.password, HASH_COST)
        .await
        .map_err(|e| {
            tracing::error!("password hashing failed during signup: {}", e);
            registration_failed()
        })?;

    state
        .repo
        .create_user(NewUser {
            name: submission.name.clone(),
            email: email.to_string(),
            password_hash,
            image: image.to_string(),
        })
        .await
        .map_err(|e| match e {
            // Two signups raced past the existence check; the unique constraint
            // decides, and the loser gets the same conflict answer.
            RepoError::DuplicateEmail => ApiError::Conflict("User already exists.".to_string()),
            _ => registration_failed(),
        })
}

/// login
///
/// [Public Route] Verifies credentials and answers with a fresh identity token.
///
/// Unknown email and wrong password produce byte-identical 403 responses so the
/// endpoint carries no account-enumeration signal. A failure of the verification
/// machinery itself, or of token signing, is a 500 instead; neither is ever
/// disguised as a credential problem.
#[utoipa::path(
    post,
    path = "/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 403, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let login_failed = || {
        ApiError::Internal(
            "Could not log you in, please check your credentials and try again.".to_string(),
        )
    };

    let email = normalize_email(&payload.email);

    let user = state
        .repo
        .find_user_by_email(&email)
        .await
        .map_err(|_| login_failed())?
        .ok_or(ApiError::InvalidCredentials)?;

    let valid = verify_password(&payload.password, &user.password_hash)
        .await
        .map_err(|e| {
            tracing::error!("password verification failed during login: {}", e);
            login_failed()
        })?;

    if !valid {
        return Err(ApiError::InvalidCredentials);
    }

    let token = issue_token(&state.config, user.id, &user.email).map_err(|e| {
        tracing::error!("token signing failed during login: {:?}", e);
        login_failed()
    })?;

    Ok(Json(AuthResponse {
        user_id: user.id,
        email: user.email,
        token,
    }))
}

// --- Fallback ---

/// route_not_found
///
/// Uniform answer for unmatched routes.
pub async fn route_not_found() -> ApiError {
    ApiError::NotFound("Could not find this route.".to_string())
}
