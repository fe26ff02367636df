use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// Defines the routes exclusively accessible to users with the 'admin' role.
/// These endpoints provide account management, store onboarding, and the
/// dashboard statistics.
///
/// Access Control:
/// This entire router is wrapped in the `require_admin` layer, which first
/// authenticates the caller (via the `AuthUser` extractor) and then checks
/// for the admin role before any handler here can run. Handlers therefore
/// never re-check the role themselves.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/stats
        // Retrieves core dashboard metrics (total users, stores, ratings, and
        // the platform-wide average rating).
        .route("/stats", get(handlers::get_admin_stats))
        // POST /admin/user
        // Creates an account with any role. Same validation policy as public
        // signup; this is how additional admins and store owners are made.
        .route("/user", post(handlers::create_user))
        // POST /admin/add-store
        // Registers a new store, bound to the owner-role user whose email
        // matches the store email.
        .route("/add-store", post(handlers::add_store))
        // GET /admin/users?name=&email=&role=
        // Filtered user listing. Substring match on name/email, exact match
        // on role; the projection never includes password data.
        .route("/users", get(handlers::get_admin_users))
        // GET /admin/stores?name=&address=&sortBy=&sortOrder=
        // Filtered, sortable store listing.
        .route("/stores", get(handlers::get_admin_stores))
        // GET /admin/store-owners
        // Overview of every owner with their stores and rating aggregates.
        .route("/store-owners", get(handlers::get_store_owners))
        // POST /admin/update-role
        // Reassigns a user's role, keyed by email.
        .route("/update-role", post(handlers::update_role))
        // POST /admin/delete-user
        // Removes an account by email; ratings and owned stores cascade.
        .route("/delete-user", post(handlers::delete_user))
}
