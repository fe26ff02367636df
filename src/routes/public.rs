use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are reachable without a role gate: the health probe
/// and the full authentication flow. Registration and signin are necessarily
/// anonymous; logout is safe for anyone; verify requires a valid session but
/// no particular role, which its `AuthUser` extractor enforces on its own.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer checks.
        // Returns "ok" immediately to verify the service is running and responsive.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/signup
        // New account registration. The handler enforces the full validation
        // policy (name length, email shape, password rules) before storage.
        .route("/auth/signup", post(handlers::signup))
        // POST /auth/signin
        // Credential verification. On success the session token is set as an
        // HTTP-only cookie and echoed in the response body.
        .route("/auth/signin", post(handlers::signin))
        // GET /auth/verify
        // Session check for the SPA on reload: confirms the cookie is still
        // valid and reports the caller's current role.
        .route("/auth/verify", get(handlers::verify))
        // POST /auth/logout
        // Expires the session cookie. Idempotent; no session required.
        .route("/auth/logout", post(handlers::logout))
}
