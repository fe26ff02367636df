use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The canonical role enumeration, stored as lowercase text in the `users.role`
/// column and serialized the same way over JSON. Display labels are a frontend
/// concern; the API only ever speaks these three codes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    #[default]
    User,
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Owner => "owner",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User
///
/// The canonical identity record from the `users` table, including the bcrypt
/// password hash. Internal use only: the hash is skipped on serialization as a
/// backstop, and listing endpoints use the `PublicUser` projection which never
/// selects the column in the first place.
#[derive(Debug, Clone, Serialize, FromRow, Default)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    // The login key. Unique across all users.
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub address: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// NewUser
///
/// Insert payload for the users table. Built by handlers after validation and
/// hashing; the plaintext password never crosses the repository boundary.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub address: Option<String>,
    pub role: Role,
}

/// PublicUser
///
/// The projection used by every multi-user listing. Deliberately has no
/// password field at all, so a credential hash cannot leak through this type.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub address: Option<String>,
    pub role: Role,
}

/// Store
///
/// A store record. Ownership is an explicit foreign key to the owning user,
/// resolved from the store email at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Store {
    pub id: Uuid,
    pub name: String,
    // Unique contact email; at creation it must belong to an owner-role user.
    pub email: String,
    pub address: String,
    pub owner_user_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// StoreWithRating
///
/// Store listing row enriched with its rating aggregate. `average_rating` is
/// 0 (never null) for a store with no ratings; callers can rely on that.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct StoreWithRating {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub address: String,
    pub owner_user_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub average_rating: f64,
    pub total_ratings: i64,
}

/// Rating
///
/// A single 1-5 star rating. One row per (user, store) pair, enforced by a
/// uniqueness constraint; submission upserts against it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Rating {
    pub id: Uuid,
    pub user_id: Uuid,
    pub store_id: Uuid,
    pub rating: i16,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// RatingWithUser
///
/// Rating row joined with the submitter's identity and the store name. Used by
/// the store-scoped listing and the owner's ratings view.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct RatingWithUser {
    pub id: Uuid,
    pub user_id: Uuid,
    pub store_id: Uuid,
    pub rating: i16,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub user_name: String,
    pub user_email: String,
    pub store_name: String,
}

/// RatingWithStore
///
/// Rating row joined with the rated store's name, for a user's own history.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct RatingWithStore {
    pub id: Uuid,
    pub user_id: Uuid,
    pub store_id: Uuid,
    pub rating: i16,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub store_name: String,
}

/// RatingSummary
///
/// One-query aggregate over a set of ratings. When `total_ratings` is 0 the
/// other fields are null; callers branch on the count, never on the presence
/// of the average.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct RatingSummary {
    pub average_rating: Option<f64>,
    pub total_ratings: i64,
    pub lowest_rating: Option<i16>,
    pub highest_rating: Option<i16>,
}

// --- Dashboard & Overview Schemas (Output) ---

/// DashboardStats
///
/// Output schema for the administrative dashboard (GET /admin/stats).
/// Field names are camelCase on the wire; this is the contract the frontend
/// dashboard consumes.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_stores: i64,
    pub total_ratings: i64,
    /// Average across all ratings in the system; 0 when there are none.
    pub average_rating: f64,
}

/// OwnedStoreSummary
///
/// Per-store line in the store-owners overview: the store plus its rating
/// aggregate, rounded to one decimal place.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct OwnedStoreSummary {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub average_rating: f64,
    pub total_ratings: i64,
}

/// StoreOwnerOverview
///
/// One owner-role user with their stores and the rating aggregate across all
/// of them (GET /admin/store-owners).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct StoreOwnerOverview {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub address: Option<String>,
    pub role: Role,
    pub stores: Vec<OwnedStoreSummary>,
    pub overall_average_rating: f64,
    pub total_ratings: i64,
}

// --- Request Payloads (Input Schemas) ---

/// CreateUserRequest
///
/// Input payload for POST /auth/signup and POST /admin/user. The role defaults
/// to Normal User when omitted, matching the column default.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub address: Option<String>,
    #[serde(default)]
    pub role: Role,
}

/// SigninRequest
///
/// Input payload for POST /auth/signin.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

/// SigninResponse
///
/// Body returned by a successful signin. The same token is also set as the
/// HTTP-only session cookie; the body copy exists for SPA state bootstrap.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SigninResponse {
    pub token: String,
    pub role: Role,
}

/// VerifyResponse
///
/// Body returned by GET /auth/verify for a valid session.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct VerifyResponse {
    pub is_valid: bool,
    pub role: Role,
}

/// CreateStoreRequest
///
/// Input payload for POST /admin/add-store. The email must belong to an
/// existing owner-role user, who becomes the store's owner.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateStoreRequest {
    pub name: String,
    pub email: String,
    pub address: String,
}

/// SubmitRatingRequest
///
/// Input payload for POST /user/rating.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SubmitRatingRequest {
    pub store_id: Uuid,
    pub rating: i16,
}

/// UpdateRatingRequest
///
/// Input payload for POST /user/rating/{id}.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateRatingRequest {
    pub rating: i16,
}

/// UpdateRoleRequest
///
/// Input payload for POST /admin/update-role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateRoleRequest {
    pub email: String,
    pub new_role: Role,
}

/// DeleteUserRequest
///
/// Input payload for POST /admin/delete-user. Deletion cascades to the user's
/// ratings and owned stores.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct DeleteUserRequest {
    pub email: String,
}

/// UpdatePasswordRequest
///
/// Input payload for POST /owner/update-password. The email must belong to the
/// authenticated caller.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdatePasswordRequest {
    pub email: String,
    pub current_password: String,
    pub new_password: String,
}

// --- Filter Structs (Query Parameters) ---

/// UserFilter
///
/// Accepted query parameters for GET /admin/users. Name and email are
/// case-insensitive substring matches, role is exact; multiple filters
/// combine conjunctively.
#[derive(Debug, Clone, Deserialize, utoipa::IntoParams, Default)]
pub struct UserFilter {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

/// StoreFilter
///
/// Accepted query parameters for the store listings. `sortBy` is resolved
/// against an allow-list of known sort keys before it goes anywhere near a
/// query; an unknown key is rejected, never interpolated.
#[derive(Debug, Clone, Deserialize, utoipa::IntoParams, Default)]
#[serde(rename_all = "camelCase")]
pub struct StoreFilter {
    pub name: Option<String>,
    pub address: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}
