use thiserror::Error;

/// Work factor for new password hashes. Calibrated so a single hash costs on the
/// order of 100ms on reference hardware: slow enough to blunt brute force, fast
/// enough to keep signup/login latency bounded.
pub const HASH_COST: u32 = 12;

/// PasswordError
///
/// Failure of the hashing machinery itself. Handlers translate this into a generic
/// server error; it must never surface to the client as "wrong password".
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("hashing task was cancelled")]
    Cancelled,
}

/// hash_password
///
/// One-way bcrypt hash at the given cost. The hash runs on the blocking thread pool
/// because a deliberate ~100ms of CPU work must not stall the async executor.
pub async fn hash_password(plaintext: &str, cost: u32) -> Result<String, PasswordError> {
    let plaintext = plaintext.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, cost))
        .await
        .map_err(|_| PasswordError::Cancelled)?
        .map_err(PasswordError::from)
}

/// verify_password
///
/// Checks a plaintext candidate against a stored digest. Returns Ok(false) for a
/// mismatch; Err only when the digest is unparsable or the verification machinery
/// fails, which is a server-error condition distinct from a bad credential.
pub async fn verify_password(plaintext: &str, digest: &str) -> Result<bool, PasswordError> {
    let plaintext = plaintext.to_string();
    let digest = digest.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &digest))
        .await
        .map_err(|_| PasswordError::Cancelled)?
        .map_err(PasswordError::from)
}
