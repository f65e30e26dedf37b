use roamer_api::password::{HASH_COST, hash_password, verify_password};

// Tests use a reduced cost so the suite stays fast; the production constant is
// asserted separately.

const TEST_COST: u32 = 4;

#[tokio::test]
async fn test_hash_and_verify_roundtrip() {
    let digest = hash_password("my-secret-password", TEST_COST).await.unwrap();

    assert!(verify_password("my-secret-password", &digest).await.unwrap());
}

#[tokio::test]
async fn test_verify_rejects_wrong_password() {
    let digest = hash_password("correct-password", TEST_COST).await.unwrap();

    assert!(!verify_password("wrong-password", &digest).await.unwrap());
}

#[tokio::test]
async fn test_hashes_are_salted() {
    let first = hash_password("same-password", TEST_COST).await.unwrap();
    let second = hash_password("same-password", TEST_COST).await.unwrap();

    assert_ne!(first, second, "two hashes of one password must not collide");
}

#[tokio::test]
async fn test_verify_garbage_digest_is_an_error_not_a_mismatch() {
    let result = verify_password("password", "not-a-bcrypt-digest").await;

    // The machinery failed; this must not be reported as a wrong password.
    assert!(result.is_err());
}

#[test]
fn test_production_cost_factor() {
    // Work factor chosen for ~100ms per hash on reference hardware.
    assert_eq!(HASH_COST, 12);
}
