use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Owner Router Module
///
/// Defines the routes for Store Owners: visibility into the ratings their
/// stores have received, and self-service password changes.
///
/// Access Control:
/// Wrapped in the `require_owner` layer. Ratings are always scoped to the
/// authenticated owner's stores via the session identity; there is no way to
/// request another owner's data.
pub fn owner_routes() -> Router<AppState> {
    Router::new()
        // GET /owner/ratings
        // Every rating across the caller's stores, with submitter identity.
        .route("/ratings", get(handlers::get_owner_ratings))
        // GET /owner/average-rating
        // Aggregate over all ratings of the caller's stores: average, count,
        // lowest, highest. Count 0 is a valid answer, not an error.
        .route("/average-rating", get(handlers::get_owner_average))
        // POST /owner/update-password
        // Changes the caller's own password after verifying the current one.
        .route("/update-password", post(handlers::update_password))
}
