use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewPlace, NewUser, Place, UpdatePlaceRequest, User, UserSummary};

/// RepoError
///
/// The persistence layer's failure vocabulary. Engine-level detail (connection
/// errors, SQL errors) is logged at the failing query site and collapsed into
/// `Unavailable` so storage internals never travel upward.
#[derive(Debug, Error, PartialEq)]
pub enum RepoError {
    #[error("storage unavailable")]
    Unavailable,
    /// The unique email constraint fired on user insertion.
    #[error("email already registered")]
    DuplicateEmail,
    /// The owner row disappeared between the handler's existence check and the
    /// place transaction. The transaction is rolled back and nothing is applied.
    #[error("owner row missing")]
    OwnerMissing,
}

/// Repository Trait
///
/// The abstract contract for all persistence operations, letting handlers interact
/// with the data layer without knowing the concrete implementation (Postgres or the
/// in-memory store used by tests).
///
/// The two composite operations (`create_place`, `delete_place`) are the
/// transactional core: each must apply its place-row mutation and the owner's
/// `place_ids` mutation together or not at all. No implementation may ever touch
/// `place_ids` outside those two methods.
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Credential Store ---
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;
    // Password hash excluded from the projection.
    async fn list_users(&self) -> Result<Vec<UserSummary>, RepoError>;
    // Fails with DuplicateEmail instead of silently deduping.
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError>;

    // --- Place Retrieval ---
    async fn get_place(&self, id: Uuid) -> Result<Option<Place>, RepoError>;
    async fn get_places_for_user(&self, user_id: Uuid) -> Result<Vec<Place>, RepoError>;

    // --- Consistency Manager ---
    // Inserts the place row and appends its id to the owner's place set in one
    // transaction.
    async fn create_place(&self, place: NewPlace) -> Result<Place, RepoError>;
    // Title/description only; single-record mutation, no cross-record transaction.
    async fn update_place(
        &self,
        id: Uuid,
        update: UpdatePlaceRequest,
    ) -> Result<Option<Place>, RepoError>;
    // Deletes the place row and removes its id from the owner's place set in one
    // transaction. The caller releases the artifact only after this returns Ok.
    async fn delete_place(&self, place: &Place) -> Result<(), RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The production implementation of the `Repository` trait, backed by PostgreSQL.
/// Cross-record atomicity comes from real database transactions; conflicting
/// mutations of the same user's `place_ids` are serialized by the row lock the
/// UPDATE takes inside each transaction.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PLACE_COLUMNS: &str = "id, title, description, address, lat, lng, image, creator, created_at";

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, image, place_ids, created_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("get_user error: {:?}", e);
            RepoError::Unavailable
        })
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, image, place_ids, created_at \
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("find_user_by_email error: {:?}", e);
            RepoError::Unavailable
        })
    }

    /// list_users
    ///
    /// Public listing. The query deliberately does not select `password_hash`; the
    /// hash never leaves the database for this endpoint.
    async fn list_users(&self) -> Result<Vec<UserSummary>, RepoError> {
        sqlx::query_as::<_, UserSummary>(
            "SELECT id, name, email, image, place_ids FROM users ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("list_users error: {:?}", e);
            RepoError::Unavailable
        })
    }

    /// create_user
    ///
    /// Inserts a fresh user with an empty place set. A unique violation on the email
    /// column is reported as DuplicateEmail so signup can answer 422 even when two
    /// requests race past the pre-insert existence check.
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let new_id = Uuid::new_v4();
        sqlx::query_as::<_, User>(
            "INSERT INTO users (id, name, email, password_hash, image, place_ids, created_at) \
             VALUES ($1, $2, $3, $4, $5, '{}', NOW()) \
             RETURNING id, name, email, password_hash, image, place_ids, created_at",
        )
        .bind(new_id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.image)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => RepoError::DuplicateEmail,
            _ => {
                tracing::error!("create_user error: {:?}", e);
                RepoError::Unavailable
            }
        })
    }

    async fn get_place(&self, id: Uuid) -> Result<Option<Place>, RepoError> {
        sqlx::query_as::<_, Place>(&format!(
            "SELECT {PLACE_COLUMNS} FROM places WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("get_place error: {:?}", e);
            RepoError::Unavailable
        })
    }

    async fn get_places_for_user(&self, user_id: Uuid) -> Result<Vec<Place>, RepoError> {
        sqlx::query_as::<_, Place>(&format!(
            "SELECT {PLACE_COLUMNS} FROM places WHERE creator = $1 ORDER BY created_at ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("get_places_for_user error: {:?}", e);
            RepoError::Unavailable
        })
    }

    /// create_place
    ///
    /// The composite insert. Both statements run inside one transaction: the place
    /// row insert and the append of its id to the owner's `place_ids`. If the owner
    /// row is gone the append touches zero rows; the transaction is dropped, which
    /// rolls everything back, and OwnerMissing is reported. Partial application is
    /// unreachable: either both records change or neither does.
    async fn create_place(&self, place: NewPlace) -> Result<Place, RepoError> {
        let unavailable = |e: sqlx::Error| {
            tracing::error!("create_place error: {:?}", e);
            RepoError::Unavailable
        };

        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        let new_id = Uuid::new_v4();
        let created = sqlx::query_as::<_, Place>(&format!(
            "INSERT INTO places (id, title, description, address, lat, lng, image, creator, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW()) \
             RETURNING {PLACE_COLUMNS}"
        ))
        .bind(new_id)
        .bind(&place.title)
        .bind(&place.description)
        .bind(&place.address)
        .bind(place.location.lat)
        .bind(place.location.lng)
        .bind(&place.image)
        .bind(place.creator)
        .fetch_one(&mut *tx)
        .await
        .map_err(unavailable)?;

        let appended = sqlx::query(
            "UPDATE users SET place_ids = array_append(place_ids, $1) WHERE id = $2",
        )
        .bind(created.id)
        .bind(place.creator)
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;

        if appended.rows_affected() == 0 {
            // Dropping the transaction rolls back the insert above.
            return Err(RepoError::OwnerMissing);
        }

        tx.commit().await.map_err(unavailable)?;
        Ok(created)
    }

    async fn update_place(
        &self,
        id: Uuid,
        update: UpdatePlaceRequest,
    ) -> Result<Option<Place>, RepoError> {
        sqlx::query_as::<_, Place>(&format!(
            "UPDATE places SET title = $2, description = $3 WHERE id = $1 RETURNING {PLACE_COLUMNS}"
        ))
        .bind(id)
        .bind(&update.title)
        .bind(&update.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("update_place error: {:?}", e);
            RepoError::Unavailable
        })
    }

    /// delete_place
    ///
    /// The composite delete, mirroring create_place: the place row removal and the
    /// removal of its id from the owner's `place_ids` commit together or not at all.
    async fn delete_place(&self, place: &Place) -> Result<(), RepoError> {
        let unavailable = |e: sqlx::Error| {
            tracing::error!("delete_place error: {:?}", e);
            RepoError::Unavailable
        };

        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        sqlx::query("DELETE FROM places WHERE id = $1")
            .bind(place.id)
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;

        sqlx::query("UPDATE users SET place_ids = array_remove(place_ids, $1) WHERE id = $2")
            .bind(place.id)
            .bind(place.creator)
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;

        tx.commit().await.map_err(unavailable)?;
        Ok(())
    }
}

// --- In-Memory Implementation (tests and local experiments) ---

#[derive(Default)]
struct MemoryState {
    users: Vec<User>,
    places: Vec<Place>,
}

/// MemoryRepository
///
/// An in-memory implementation of `Repository` used by the test suites. All state
/// lives behind a single mutex, so each composite operation is applied atomically:
/// the bidirectional invariant between a place row and its owner's `place_ids`
/// holds at every observable point, exactly as the Postgres transactions guarantee.
///
/// The `fail` flag flips every operation into the `Unavailable` error path, which
/// lets tests exercise storage-outage handling without a database.
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
    fail: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repository where every operation reports storage unavailability.
    pub fn new_failing() -> Self {
        let repo = Self::default();
        repo.fail.store(true, Ordering::SeqCst);
        repo
    }

    /// Toggles failure mode at runtime.
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    /// Seeds a user directly, bypassing signup. Test convenience.
    pub fn insert_user(&self, user: User) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.users.push(user);
    }

    fn check_available(&self) -> Result<(), RepoError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(RepoError::Unavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        self.check_available()?;
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        self.check_available()?;
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> Result<Vec<UserSummary>, RepoError> {
        self.check_available()?;
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .users
            .iter()
            .map(|u| UserSummary {
                id: u.id,
                name: u.name.clone(),
                email: u.email.clone(),
                image: u.image.clone(),
                place_ids: u.place_ids.clone(),
            })
            .collect())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(RepoError::DuplicateEmail);
        }
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            image: user.image,
            place_ids: vec![],
            created_at: Utc::now(),
        };
        state.users.push(created.clone());
        Ok(created)
    }

    async fn get_place(&self, id: Uuid) -> Result<Option<Place>, RepoError> {
        self.check_available()?;
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.places.iter().find(|p| p.id == id).cloned())
    }

    async fn get_places_for_user(&self, user_id: Uuid) -> Result<Vec<Place>, RepoError> {
        self.check_available()?;
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .places
            .iter()
            .filter(|p| p.creator == user_id)
            .cloned()
            .collect())
    }

    async fn create_place(&self, place: NewPlace) -> Result<Place, RepoError> {
        self.check_available()?;
        // One lock scope covers both mutations, so no observer can see the place
        // without the owner's reference or vice versa.
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let Some(owner_index) = state.users.iter().position(|u| u.id == place.creator) else {
            return Err(RepoError::OwnerMissing);
        };
        let created = Place {
            id: Uuid::new_v4(),
            title: place.title,
            description: place.description,
            address: place.address,
            location: place.location,
            image: place.image,
            creator: place.creator,
            created_at: Utc::now(),
        };
        state.places.push(created.clone());
        state.users[owner_index].place_ids.push(created.id);
        Ok(created)
    }

    async fn update_place(
        &self,
        id: Uuid,
        update: UpdatePlaceRequest,
    ) -> Result<Option<Place>, RepoError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let Some(place) = state.places.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        place.title = update.title;
        place.description = update.description;
        Ok(Some(place.clone()))
    }

    async fn delete_place(&self, place: &Place) -> Result<(), RepoError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.places.retain(|p| p.id != place.id);
        if let Some(owner) = state.users.iter_mut().find(|u| u.id == place.creator) {
            owner.place_ids.retain(|pid| *pid != place.id);
        }
        Ok(())
    }
}
