use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// User Router Module
///
/// Defines the routes for Normal Users: browsing stores with their rating
/// aggregates and submitting, updating, and reading ratings.
///
/// Access Control:
/// The whole router sits behind the `require_user` layer. Admins and owners
/// are deliberately excluded from rating stores; they get a 403 at the layer,
/// before any handler runs.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        // GET /user/stores?name=&address=&sortBy=&sortOrder=
        // Browsing listing: every store with its average rating and rating
        // count. Sortable by the aggregate columns as well.
        .route("/stores", get(handlers::get_user_stores))
        // GET /user/stores/{id}
        // Detail view of a single store.
        .route("/stores/{id}", get(handlers::get_store_details))
        // POST /user/rating
        // Submits the caller's rating for a store. First submission creates
        // (201), a repeat replaces the previous value (200).
        .route("/rating", post(handlers::submit_rating))
        // POST /user/rating/{id}
        // Rewrites an existing rating by ID. Author-only; enforced in the
        // handler against the rating's stored user_id.
        .route("/rating/{id}", post(handlers::update_rating))
        // GET /user/ratings/store/{store_id}
        // All ratings for one store with submitter identity, newest first.
        .route("/ratings/store/{store_id}", get(handlers::get_store_ratings))
        // GET /user/ratings/user/{user_id}
        // One user's rating history with store names, newest first.
        .route("/ratings/user/{user_id}", get(handlers::get_user_ratings))
}
