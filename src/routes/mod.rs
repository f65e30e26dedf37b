/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated modules.
/// Access control is applied explicitly at the module level (via Axum layers),
/// preventing accidental exposure of protected endpoints.

/// Routes accessible to all users (anonymous reads plus the signup/login gateway).
pub mod public;

/// Routes protected by the bearer-token guard middleware.
/// Every handler here receives a verified request identity.
pub mod authenticated;
