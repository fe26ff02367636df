use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, header, request::Parts},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::sync::Arc;
use store_ratings::{
    AppState,
    auth::{AuthUser, Claims, TokenError, clear_session_cookie, session_cookie, verify_token},
    config::{AppConfig, Env},
    models::{
        CreateStoreRequest, DashboardStats, NewUser, PublicUser, Rating, RatingSummary,
        RatingWithStore, RatingWithUser, Role, Store, StoreFilter, StoreOwnerOverview,
        StoreWithRating, User, UserFilter,
    },
    repository::{Repository, StorageError},
};
use uuid::Uuid;

// --- Mock Repository for Auth Logic ---

#[derive(Default)]
struct MockAuthRepo {
    user_to_return: Option<User>,
}

#[async_trait]
impl Repository for MockAuthRepo {
    async fn get_user_by_id(&self, _id: Uuid) -> Result<Option<User>, StorageError> {
        Ok(self.user_to_return.clone())
    }
    // Implement all other unused trait methods with placeholders (ensuring they compile)
    async fn create_user(&self, _user: NewUser) -> Result<User, StorageError> {
        Ok(User::default())
    }
    async fn get_user_by_email(&self, _email: &str) -> Result<Option<User>, StorageError> {
        Ok(None)
    }
    async fn get_all_users(&self, _filter: UserFilter) -> Result<Vec<PublicUser>, StorageError> {
        Ok(vec![])
    }
    async fn get_users_by_role(&self, _role: Role) -> Result<Vec<PublicUser>, StorageError> {
        Ok(vec![])
    }
    async fn update_user_role(&self, _email: &str, _new_role: Role) -> Result<bool, StorageError> {
        Ok(false)
    }
    async fn update_user_password(
        &self,
        _email: &str,
        _password_hash: &str,
    ) -> Result<bool, StorageError> {
        Ok(false)
    }
    async fn delete_user(&self, _email: &str) -> Result<bool, StorageError> {
        Ok(false)
    }
    async fn create_store(
        &self,
        _req: CreateStoreRequest,
        _owner_user_id: Uuid,
    ) -> Result<Store, StorageError> {
        Ok(Store::default())
    }
    async fn get_store(&self, _id: Uuid) -> Result<Option<Store>, StorageError> {
        Ok(None)
    }
    async fn get_store_by_email(&self, _email: &str) -> Result<Option<Store>, StorageError> {
        Ok(None)
    }
    async fn get_all_stores(&self, _filter: StoreFilter) -> Result<Vec<Store>, StorageError> {
        Ok(vec![])
    }
    async fn get_stores_with_ratings(
        &self,
        _filter: StoreFilter,
    ) -> Result<Vec<StoreWithRating>, StorageError> {
        Ok(vec![])
    }
    async fn get_store_owners(&self) -> Result<Vec<StoreOwnerOverview>, StorageError> {
        Ok(vec![])
    }
    async fn upsert_rating(
        &self,
        _store_id: Uuid,
        _user_id: Uuid,
        _value: i16,
    ) -> Result<(Rating, bool), StorageError> {
        Ok((Rating::default(), true))
    }
    async fn update_rating(
        &self,
        _store_id: Uuid,
        _user_id: Uuid,
        _value: i16,
    ) -> Result<bool, StorageError> {
        Ok(false)
    }
    async fn get_rating(&self, _id: Uuid) -> Result<Option<Rating>, StorageError> {
        Ok(None)
    }
    async fn get_user_store_rating(
        &self,
        _user_id: Uuid,
        _store_id: Uuid,
    ) -> Result<Option<i16>, StorageError> {
        Ok(None)
    }
    async fn get_store_ratings(&self, _store_id: Uuid) -> Result<Vec<RatingWithUser>, StorageError> {
        Ok(vec![])
    }
    async fn get_user_ratings(&self, _user_id: Uuid) -> Result<Vec<RatingWithStore>, StorageError> {
        Ok(vec![])
    }
    async fn get_owner_ratings(
        &self,
        _owner_user_id: Uuid,
    ) -> Result<Vec<RatingWithUser>, StorageError> {
        Ok(vec![])
    }
    async fn get_owner_rating_summary(
        &self,
        _owner_user_id: Uuid,
    ) -> Result<RatingSummary, StorageError> {
        Ok(RatingSummary::default())
    }
    async fn get_dashboard_stats(&self) -> Result<DashboardStats, StorageError> {
        Ok(DashboardStats::default())
    }
}

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const TEST_USER_ID: Uuid = Uuid::from_u128(1);

/// Signs a token with the test secret whose expiry sits `exp_offset` seconds
/// from now. Negative offsets produce already-expired tokens.
fn create_token(user_id: Uuid, role: Role, exp_offset: i64) -> String {
    let now = chrono::Utc::now().timestamp();

    let claims = Claims {
        sub: user_id,
        role,
        iat: now as usize,
        exp: (now + exp_offset) as usize,
    };

    let key = EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

fn create_app_state(env: Env, repo: MockAuthRepo, jwt_secret: String) -> AppState {
    let mut config = AppConfig::default();
    config.env = env;
    config.jwt_secret = jwt_secret;

    AppState {
        repo: Arc::new(repo),
        config,
    }
}

fn test_user(id: Uuid, role: Role) -> User {
    User {
        id,
        name: "Authenticated Example Person".to_string(),
        email: "test@example.com".to_string(),
        password_hash: "$2b$04$irrelevant".to_string(),
        address: None,
        role,
        created_at: chrono::Utc::now(),
    }
}

/// Helper to get the mutable Parts struct from a generated Request
fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn with_session_cookie(parts: &mut Parts, token: &str) {
    parts.headers.insert(
        header::COOKIE,
        header::HeaderValue::from_str(&format!("auth_token={token}")).unwrap(),
    );
}

// --- Token Verification Tests ---

#[test]
fn test_verify_token_round_trip() {
    let token = create_token(TEST_USER_ID, Role::Owner, 3600);

    let claims = verify_token(&token, TEST_JWT_SECRET).expect("fresh token should verify");
    assert_eq!(claims.sub, TEST_USER_ID);
    assert_eq!(claims.role, Role::Owner);
}

#[test]
fn test_verify_token_rejects_expired_with_zero_leeway() {
    // One second past expiry must already fail; there is no grace window.
    let token = create_token(TEST_USER_ID, Role::User, -1);
    assert_eq!(
        verify_token(&token, TEST_JWT_SECRET).unwrap_err(),
        TokenError::Expired
    );

    // Sixty seconds past expiry would still pass under the library's default
    // leeway; it must fail here.
    let token = create_token(TEST_USER_ID, Role::User, -60);
    assert_eq!(
        verify_token(&token, TEST_JWT_SECRET).unwrap_err(),
        TokenError::Expired
    );

    // A token still inside its lifetime verifies.
    let token = create_token(TEST_USER_ID, Role::User, 60);
    assert!(verify_token(&token, TEST_JWT_SECRET).is_ok());
}

#[test]
fn test_verify_token_rejects_wrong_secret() {
    let token = create_token(TEST_USER_ID, Role::User, 3600);
    assert_eq!(
        verify_token(&token, "a-completely-different-secret").unwrap_err(),
        TokenError::InvalidSignature
    );
}

#[test]
fn test_verify_token_rejects_garbage() {
    assert_eq!(
        verify_token("not-a-token-at-all", TEST_JWT_SECRET).unwrap_err(),
        TokenError::Malformed
    );
}

// --- Session Cookie Tests ---

#[test]
fn test_session_cookie_attributes_per_environment() {
    let mut config = AppConfig::default();
    config.env = Env::Local;

    let local = session_cookie("tok", &config);
    assert!(local.starts_with("auth_token=tok"));
    assert!(local.contains("HttpOnly"));
    assert!(local.contains("SameSite=Lax"));
    assert!(local.contains("Max-Age=86400"));
    assert!(!local.contains("Secure"));

    config.env = Env::Production;
    let production = session_cookie("tok", &config);
    assert!(production.contains("SameSite=None"));
    assert!(production.contains("Secure"));
}

#[test]
fn test_clear_session_cookie_expires_immediately() {
    let config = AppConfig::default();
    let cleared = clear_session_cookie(&config);
    assert!(cleared.starts_with("auth_token=;"));
    assert!(cleared.contains("Max-Age=0"));
}

// --- AuthUser Extractor Tests ---

#[tokio::test]
async fn test_auth_success_with_valid_session_cookie() {
    let token = create_token(TEST_USER_ID, Role::User, 3600);

    let mock_repo = MockAuthRepo {
        user_to_return: Some(test_user(TEST_USER_ID, Role::User)),
    };
    let app_state = create_app_state(Env::Production, mock_repo, TEST_JWT_SECRET.to_string());

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_session_cookie(&mut parts, &token);

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(auth_user.is_ok());
    let user = auth_user.unwrap();
    assert_eq!(user.id, TEST_USER_ID);
    assert_eq!(user.role, Role::User);
}

#[tokio::test]
async fn test_auth_reads_cookie_among_other_pairs() {
    let token = create_token(TEST_USER_ID, Role::Admin, 3600);

    let mock_repo = MockAuthRepo {
        user_to_return: Some(test_user(TEST_USER_ID, Role::Admin)),
    };
    let app_state = create_app_state(Env::Local, mock_repo, TEST_JWT_SECRET.to_string());

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::COOKIE,
        header::HeaderValue::from_str(&format!("theme=dark; auth_token={token}; lang=en")).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert_eq!(auth_user.unwrap().role, Role::Admin);
}

#[tokio::test]
async fn test_auth_failure_with_missing_cookie() {
    let app_state = create_app_state(
        Env::Production,
        MockAuthRepo::default(),
        TEST_JWT_SECRET.to_string(),
    );

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(auth_user.is_err());
    assert_eq!(
        auth_user.unwrap_err().status_code(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_auth_failure_with_expired_session() {
    let token = create_token(TEST_USER_ID, Role::User, -10);

    let mock_repo = MockAuthRepo {
        user_to_return: Some(test_user(TEST_USER_ID, Role::User)),
    };
    let app_state = create_app_state(Env::Production, mock_repo, TEST_JWT_SECRET.to_string());

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_session_cookie(&mut parts, &token);

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(auth_user.is_err());
    assert_eq!(
        auth_user.unwrap_err().status_code(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_auth_failure_when_user_was_deleted() {
    // The token is valid, but the repository no longer knows the subject.
    let token = create_token(TEST_USER_ID, Role::User, 3600);
    let app_state = create_app_state(
        Env::Production,
        MockAuthRepo::default(),
        TEST_JWT_SECRET.to_string(),
    );

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_session_cookie(&mut parts, &token);

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(auth_user.is_err());
    assert_eq!(
        auth_user.unwrap_err().status_code(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_auth_role_comes_from_database_not_token() {
    // Token was issued while the user was an owner; the database now says
    // admin. The resolved identity must carry the current role.
    let token = create_token(TEST_USER_ID, Role::Owner, 3600);

    let mock_repo = MockAuthRepo {
        user_to_return: Some(test_user(TEST_USER_ID, Role::Admin)),
    };
    let app_state = create_app_state(Env::Local, mock_repo, TEST_JWT_SECRET.to_string());

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_session_cookie(&mut parts, &token);

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert_eq!(auth_user.unwrap().role, Role::Admin);
}
