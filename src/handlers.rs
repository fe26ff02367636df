use crate::{
    AppState,
    auth::{self, AuthUser},
    error::ApiError,
    models::{
        CreateStoreRequest, CreateUserRequest, DashboardStats, DeleteUserRequest, NewUser,
        PublicUser, RatingSummary, RatingWithStore, RatingWithUser, Role, SigninRequest,
        SigninResponse, Store, StoreFilter, StoreOwnerOverview, StoreWithRating,
        SubmitRatingRequest, UpdatePasswordRequest, UpdateRatingRequest, UpdateRoleRequest,
        UserFilter, VerifyResponse,
    },
    repository::StorageError,
    response::{ApiResponse, ApiResult, ValidJson, ValidQuery},
    validation,
};
use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use uuid::Uuid;

// --- Shared Helpers ---

/// Runs the full new-account policy: required fields, name length, email
/// shape, password rules, and the address cap. Shared by public signup and
/// the admin's user creation so the two can never drift apart.
fn validate_new_user(payload: &CreateUserRequest) -> Result<(), ApiError> {
    validation::require_fields(
        &[&payload.email, &payload.password],
        "Email and password are required.",
    )?;
    validation::validate_name(&payload.name)?;
    validation::validate_email(&payload.email)?;
    validation::validate_password(&payload.password)?;
    if let Some(address) = &payload.address {
        validation::validate_address(address)?;
    }
    Ok(())
}

/// bcrypt with the default cost. A hashing failure is an internal fault and
/// must never echo anything password-related back to the client.
fn hash_password(password: &str) -> Result<String, ApiError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| {
        tracing::error!(error = %e, "failed to hash password");
        ApiError::Internal
    })
}

fn verify_password(password: &str, password_hash: &str) -> Result<bool, ApiError> {
    bcrypt::verify(password, password_hash).map_err(|e| {
        tracing::error!(error = %e, "failed to verify password hash");
        ApiError::Internal
    })
}

/// Validates, hashes, and inserts a new account. The pre-check gives the
/// friendly conflict message; the DuplicateEmail arm catches the race where
/// two signups pass the pre-check simultaneously.
async fn register_user(state: &AppState, payload: CreateUserRequest) -> Result<(), ApiError> {
    validate_new_user(&payload)?;

    if state
        .repo
        .get_user_by_email(&payload.email)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("User already exists.".to_string()));
    }

    let password_hash = hash_password(&payload.password)?;
    let new_user = NewUser {
        name: payload.name,
        email: payload.email,
        password_hash,
        address: payload.address,
        role: payload.role,
    };

    match state.repo.create_user(new_user).await {
        Ok(_) => Ok(()),
        Err(StorageError::DuplicateEmail) => {
            Err(ApiError::Conflict("User already exists.".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

// --- Auth Handlers ---

/// signup
///
/// [Public Route] Registers a new account. The payload must pass the full
/// validation policy before any storage call happens; the password is stored
/// only as a bcrypt hash.
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User registered", body = String),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreateUserRequest>,
) -> ApiResult<&'static str> {
    register_user(&state, payload).await?;
    Ok(ApiResponse::created("User registered successfully."))
}

/// signin
///
/// [Public Route] Verifies credentials and opens a session: a signed token is
/// set as the HTTP-only session cookie and echoed in the body for SPA state.
///
/// *Security*: unknown email and wrong password share one message, so the
/// endpoint cannot be used to probe which emails are registered.
#[utoipa::path(
    post,
    path = "/auth/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signed in", body = SigninResponse),
        (status = 400, description = "Invalid credentials")
    )
)]
pub async fn signin(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<SigninRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validation::require_fields(
        &[&payload.email, &payload.password],
        "Email and password are required.",
    )?;

    let invalid = || ApiError::BadRequest("Invalid email or password.".to_string());

    let user = state
        .repo
        .get_user_by_email(&payload.email)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(invalid());
    }

    let token = auth::issue_token(user.id, user.role, &state.config)?;
    let cookie = auth::session_cookie(&token, &state.config);

    Ok((
        [(header::SET_COOKIE, cookie)],
        ApiResponse::ok(SigninResponse {
            token,
            role: user.role,
        }),
    ))
}

/// verify
///
/// [Authenticated Route] Confirms the session cookie is still valid and
/// reports the caller's current role. The heavy lifting happens in the
/// AuthUser extractor; reaching the handler body means the session is good.
#[utoipa::path(
    get,
    path = "/auth/verify",
    responses(
        (status = 200, description = "Session is valid", body = VerifyResponse),
        (status = 401, description = "Missing or invalid session")
    )
)]
pub async fn verify(AuthUser { role, .. }: AuthUser) -> ApiResult<VerifyResponse> {
    Ok(ApiResponse::ok(VerifyResponse {
        is_valid: true,
        role,
    }))
}

/// logout
///
/// [Public Route] Ends the session by expiring the session cookie. Safe to
/// call without a session; the result is the same either way.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 200, description = "Session cleared", body = String))
)]
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let cookie = auth::clear_session_cookie(&state.config);
    (
        [(header::SET_COOKIE, cookie)],
        ApiResponse::ok("Logged out successfully"),
    )
}

// --- Admin Handlers ---

/// create_user
///
/// [Admin Route] Creates an account with any role, including other admins and
/// store owners. Runs the exact same validation policy as public signup.
#[utoipa::path(
    post,
    path = "/admin/user",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = String),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreateUserRequest>,
) -> ApiResult<&'static str> {
    register_user(&state, payload).await?;
    Ok(ApiResponse::created("User created successfully"))
}

/// add_store
///
/// [Admin Route] Registers a new store. The store email must belong to an
/// existing user with the owner role, who becomes the store's owner; there is
/// no way to create an orphaned store.
#[utoipa::path(
    post,
    path = "/admin/add-store",
    request_body = CreateStoreRequest,
    responses(
        (status = 201, description = "Store added", body = String),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "No owner-role user with that email"),
        (status = 409, description = "Store email already in use")
    )
)]
pub async fn add_store(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreateStoreRequest>,
) -> ApiResult<&'static str> {
    validation::require_fields(
        &[&payload.name, &payload.email, &payload.address],
        "Missing required fields",
    )?;
    validation::validate_email(&payload.email)?;
    validation::validate_address(&payload.address)?;

    let owner = state
        .repo
        .get_user_by_email(&payload.email)
        .await?
        .filter(|user| user.role == Role::Owner)
        .ok_or_else(|| ApiError::NotFound("Owner not found".to_string()))?;

    // Friendly duplicate check; the unique constraint still backstops races.
    if state.repo.get_store_by_email(&payload.email).await?.is_some() {
        return Err(ApiError::Conflict(
            "A store with this email already exists".to_string(),
        ));
    }

    match state.repo.create_store(payload, owner.id).await {
        Ok(_) => Ok(ApiResponse::created("Store added successfully")),
        Err(StorageError::DuplicateEmail) => Err(ApiError::Conflict(
            "A store with this email already exists".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

/// get_admin_users
///
/// [Admin Route] Lists users with optional name/email substring filters and
/// an exact role filter. The projection never contains a password field.
#[utoipa::path(
    get,
    path = "/admin/users",
    params(UserFilter),
    responses((status = 200, description = "Users", body = [PublicUser]))
)]
pub async fn get_admin_users(
    State(state): State<AppState>,
    ValidQuery(filter): ValidQuery<UserFilter>,
) -> ApiResult<Vec<PublicUser>> {
    let users = state.repo.get_all_users(filter).await?;
    Ok(ApiResponse::ok(users))
}

/// get_admin_stores
///
/// [Admin Route] Lists stores with optional name/address filters and
/// allow-listed sorting.
#[utoipa::path(
    get,
    path = "/admin/stores",
    params(StoreFilter),
    responses(
        (status = 200, description = "Stores", body = [Store]),
        (status = 400, description = "Unknown sort key")
    )
)]
pub async fn get_admin_stores(
    State(state): State<AppState>,
    ValidQuery(filter): ValidQuery<StoreFilter>,
) -> ApiResult<Vec<Store>> {
    let stores = state.repo.get_all_stores(filter).await?;
    Ok(ApiResponse::ok(stores))
}

/// get_store_owners
///
/// [Admin Route] The store-owners overview: every owner-role user with their
/// stores, per-store aggregates, and the overall average across all their
/// ratings. Owners without stores are included with an empty list.
#[utoipa::path(
    get,
    path = "/admin/store-owners",
    responses((status = 200, description = "Store owners", body = [StoreOwnerOverview]))
)]
pub async fn get_store_owners(State(state): State<AppState>) -> ApiResult<Vec<StoreOwnerOverview>> {
    let owners = state.repo.get_store_owners().await?;
    Ok(ApiResponse::ok(owners))
}

/// get_admin_stats
///
/// [Admin Route] Retrieves core dashboard metrics: user, store, and rating
/// counts plus the platform-wide average rating (0 when nothing has been
/// rated yet, never null).
#[utoipa::path(
    get,
    path = "/admin/stats",
    responses((status = 200, description = "Dashboard statistics", body = DashboardStats))
)]
pub async fn get_admin_stats(State(state): State<AppState>) -> ApiResult<DashboardStats> {
    let stats = state.repo.get_dashboard_stats().await?;
    Ok(ApiResponse::ok(stats))
}

/// update_role
///
/// [Admin Route] Reassigns a user's role, keyed by email.
#[utoipa::path(
    post,
    path = "/admin/update-role",
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = String),
        (status = 404, description = "No user with that email")
    )
)]
pub async fn update_role(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<UpdateRoleRequest>,
) -> ApiResult<&'static str> {
    validation::require_fields(&[&payload.email], "Email and new role are required.")?;

    if !state
        .repo
        .update_user_role(&payload.email, payload.new_role)
        .await?
    {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    Ok(ApiResponse::ok("Role updated successfully."))
}

/// delete_user
///
/// [Admin Route] Removes a user account by email. The user's ratings and any
/// stores they own are removed with it.
#[utoipa::path(
    post,
    path = "/admin/delete-user",
    request_body = DeleteUserRequest,
    responses(
        (status = 200, description = "User deleted", body = String),
        (status = 404, description = "No user with that email")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<DeleteUserRequest>,
) -> ApiResult<&'static str> {
    validation::require_fields(&[&payload.email], "Email is required.")?;

    if !state.repo.delete_user(&payload.email).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    Ok(ApiResponse::ok("User deleted successfully."))
}

// --- User Handlers ---

/// get_user_stores
///
/// [User Route] The browsing listing: all stores with their average rating
/// and rating count, filterable and sortable (including by average_rating and
/// total_ratings).
#[utoipa::path(
    get,
    path = "/user/stores",
    params(StoreFilter),
    responses(
        (status = 200, description = "Stores with aggregates", body = [StoreWithRating]),
        (status = 400, description = "Unknown sort key")
    )
)]
pub async fn get_user_stores(
    State(state): State<AppState>,
    ValidQuery(filter): ValidQuery<StoreFilter>,
) -> ApiResult<Vec<StoreWithRating>> {
    let stores = state.repo.get_stores_with_ratings(filter).await?;
    Ok(ApiResponse::ok(stores))
}

/// get_store_details
///
/// [User Route] Detail view of a single store.
#[utoipa::path(
    get,
    path = "/user/stores/{id}",
    responses(
        (status = 200, description = "Store", body = Store),
        (status = 404, description = "Store not found")
    )
)]
pub async fn get_store_details(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Store> {
    let store = state
        .repo
        .get_store(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Store not found".to_string()))?;
    Ok(ApiResponse::ok(store))
}

/// submit_rating
///
/// [User Route] Submits the caller's rating for a store. One rating per
/// (user, store) pair: a first submission creates it (201), a repeat
/// submission replaces the value (200). The bounds check runs before any
/// storage call, so an out-of-range value writes nothing.
#[utoipa::path(
    post,
    path = "/user/rating",
    request_body = SubmitRatingRequest,
    responses(
        (status = 201, description = "Rating created", body = String),
        (status = 200, description = "Existing rating replaced", body = String),
        (status = 400, description = "Rating out of range"),
        (status = 404, description = "Store not found")
    )
)]
pub async fn submit_rating(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<SubmitRatingRequest>,
) -> ApiResult<&'static str> {
    validation::validate_rating(payload.rating)?;

    if state.repo.get_store(payload.store_id).await?.is_none() {
        return Err(ApiError::NotFound("Store not found".to_string()));
    }

    let (_, created) = state
        .repo
        .upsert_rating(payload.store_id, user_id, payload.rating)
        .await?;

    if created {
        Ok(ApiResponse::created("Rating submitted successfully"))
    } else {
        Ok(ApiResponse::ok("Rating updated successfully"))
    }
}

/// update_rating
///
/// [User Route] Rewrites an existing rating by its ID. Only the rating's
/// author may update it; anyone else gets a 403 and the value stays put.
#[utoipa::path(
    post,
    path = "/user/rating/{id}",
    request_body = UpdateRatingRequest,
    responses(
        (status = 200, description = "Rating updated", body = String),
        (status = 400, description = "Rating out of range"),
        (status = 403, description = "Not the rating's author"),
        (status = 404, description = "Rating not found")
    )
)]
pub async fn update_rating(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<UpdateRatingRequest>,
) -> ApiResult<&'static str> {
    validation::validate_rating(payload.rating)?;

    let existing = state
        .repo
        .get_rating(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Rating not found".to_string()))?;

    if existing.user_id != user_id {
        return Err(ApiError::Forbidden(
            "Not authorized to update this rating".to_string(),
        ));
    }

    if !state
        .repo
        .update_rating(existing.store_id, user_id, payload.rating)
        .await?
    {
        // The rating vanished between the ownership check and the update.
        return Err(ApiError::NotFound("Rating not found".to_string()));
    }
    Ok(ApiResponse::ok("Rating updated successfully"))
}

/// get_store_ratings
///
/// [User Route] All ratings submitted for one store, newest first, with the
/// submitter's name and email.
#[utoipa::path(
    get,
    path = "/user/ratings/store/{store_id}",
    responses(
        (status = 200, description = "Ratings", body = [RatingWithUser]),
        (status = 404, description = "No ratings for this store")
    )
)]
pub async fn get_store_ratings(
    State(state): State<AppState>,
    Path(store_id): Path<Uuid>,
) -> ApiResult<Vec<RatingWithUser>> {
    let ratings = state.repo.get_store_ratings(store_id).await?;
    if ratings.is_empty() {
        return Err(ApiError::NotFound(
            "No ratings found for this store".to_string(),
        ));
    }
    Ok(ApiResponse::ok(ratings))
}

/// get_user_ratings
///
/// [User Route] One user's rating history, newest first, with store names.
#[utoipa::path(
    get,
    path = "/user/ratings/user/{user_id}",
    responses(
        (status = 200, description = "Ratings", body = [RatingWithStore]),
        (status = 404, description = "No ratings for this user")
    )
)]
pub async fn get_user_ratings(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Vec<RatingWithStore>> {
    let ratings = state.repo.get_user_ratings(user_id).await?;
    if ratings.is_empty() {
        return Err(ApiError::NotFound(
            "No ratings found for this user".to_string(),
        ));
    }
    Ok(ApiResponse::ok(ratings))
}

// --- Owner Handlers ---

/// get_owner_ratings
///
/// [Owner Route] Every rating across the caller's stores with submitter
/// identity, newest first. An owner with no ratings yet gets an empty list,
/// not an error.
#[utoipa::path(
    get,
    path = "/owner/ratings",
    responses((status = 200, description = "Ratings for the owner's stores", body = [RatingWithUser]))
)]
pub async fn get_owner_ratings(
    AuthUser { id: owner_id, .. }: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Vec<RatingWithUser>> {
    let ratings = state.repo.get_owner_ratings(owner_id).await?;
    Ok(ApiResponse::ok(ratings))
}

/// get_owner_average
///
/// [Owner Route] The aggregate over all ratings of the caller's stores:
/// average, count, lowest, and highest. With no ratings the count is 0 and
/// the other fields are null; the request still succeeds.
#[utoipa::path(
    get,
    path = "/owner/average-rating",
    responses((status = 200, description = "Rating summary", body = RatingSummary))
)]
pub async fn get_owner_average(
    AuthUser { id: owner_id, .. }: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<RatingSummary> {
    let summary = state.repo.get_owner_rating_summary(owner_id).await?;
    Ok(ApiResponse::ok(summary))
}

/// update_password
///
/// [Owner Route] Changes the caller's own password. The email in the payload
/// must match the authenticated account; the current password must verify;
/// and the new password must pass the same policy as registration.
#[utoipa::path(
    post,
    path = "/owner/update-password",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = String),
        (status = 400, description = "Wrong current password or weak new password"),
        (status = 403, description = "Email does not match the session")
    )
)]
pub async fn update_password(
    AuthUser { id: owner_id, .. }: AuthUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<UpdatePasswordRequest>,
) -> ApiResult<&'static str> {
    validation::require_fields(
        &[
            &payload.email,
            &payload.current_password,
            &payload.new_password,
        ],
        "Email, current password, and new password are required.",
    )?;

    // The session, not the payload, decides whose password changes.
    let user = state
        .repo
        .get_user_by_id(owner_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found.".to_string()))?;

    if user.email != payload.email {
        return Err(ApiError::Forbidden(
            "Not authorized to update this account".to_string(),
        ));
    }

    if !verify_password(&payload.current_password, &user.password_hash)? {
        return Err(ApiError::BadRequest(
            "Current password is incorrect.".to_string(),
        ));
    }

    validation::validate_password(&payload.new_password)?;

    let password_hash = hash_password(&payload.new_password)?;
    if !state
        .repo
        .update_user_password(&user.email, &password_hash)
        .await?
    {
        return Err(ApiError::NotFound("User not found.".to_string()));
    }
    Ok(ApiResponse::ok("Password updated successfully."))
}
