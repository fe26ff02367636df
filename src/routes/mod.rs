/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated modules,
/// enforcing a Defense-in-Depth strategy. This structure ensures that
/// access control is applied explicitly at the module level (via Axum layers),
/// preventing accidental exposure of protected endpoints.
///
/// The four modules map directly to the defined access roles.

/// Routes accessible without a session: the health probe and the /auth group.
/// (`/auth/verify` does require a valid session, enforced by its extractor.)
pub mod public;

/// Routes restricted exclusively to users with the 'admin' role.
/// Gated by the `require_admin` layer.
pub mod admin;

/// Routes restricted to Normal Users: store browsing and rating submission.
/// Gated by the `require_user` layer.
pub mod user;

/// Routes restricted to Store Owners: their ratings view and password change.
/// Gated by the `require_owner` layer.
pub mod owner;
