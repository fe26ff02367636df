use axum::{
    extract::{FromRef, FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::Role,
    repository::RepositoryState,
};

/// Name of the HTTP-only cookie that carries the session token. This cookie is
/// the only token transport the API accepts; there is no Authorization header
/// fallback.
pub const AUTH_COOKIE: &str = "auth_token";

/// Session lifetime in seconds (24 hours). Used both as the JWT expiry offset
/// and as the cookie Max-Age, so the two always expire together.
pub const TOKEN_TTL_SECS: usize = 24 * 60 * 60;

/// Claims
///
/// The payload signed into every session token. Claims are signed with the
/// server secret on signin and validated on every authenticated request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the UUID of the user. This is the primary key used to
    /// fetch the user's current record from the users table.
    pub sub: Uuid,
    /// Role at issue time. Informational only: authorization always re-reads
    /// the role from the database, so a stale claim cannot widen access.
    pub role: Role,
    /// Expiration Time (exp): timestamp after which the token must not be
    /// accepted.
    pub exp: usize,
    /// Issued At (iat): timestamp when the token was issued.
    pub iat: usize,
}

/// TokenError
///
/// Verification failures, collapsed into the three cases callers care about.
/// All of them map to a 401 at the HTTP boundary; the split exists for logging
/// and for tests that pin the boundary behavior.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("malformed token")]
    Malformed,
}

/// issue_token
///
/// Signs a fresh session token for the given user, valid for
/// [`TOKEN_TTL_SECS`] from now. Signing can only fail if the claims cannot be
/// serialized, which is an internal fault, not a client error.
pub fn issue_token(user_id: Uuid, role: Role, config: &AppConfig) -> Result<String, ApiError> {
    let now = chrono::Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id,
        role,
        exp: now + TOKEN_TTL_SECS,
        iat: now,
    };

    let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
    encode(&Header::default(), &claims, &encoding_key).map_err(|e| {
        tracing::error!(error = %e, "failed to sign session token");
        ApiError::Internal
    })
}

/// verify_token
///
/// Decodes and validates a session token against the server secret.
///
/// Expiry is checked with zero leeway: a token is valid strictly until its
/// `exp` timestamp and not a second longer. The jsonwebtoken default of 60
/// seconds of clock slack would quietly extend every session past its
/// advertised lifetime.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, TokenError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.leeway = 0;

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(data) => Ok(data.claims),
        Err(e) => match e.kind() {
            ErrorKind::ExpiredSignature => Err(TokenError::Expired),
            ErrorKind::InvalidSignature => Err(TokenError::InvalidSignature),
            _ => Err(TokenError::Malformed),
        },
    }
}

/// session_cookie
///
/// Builds the Set-Cookie value that stores a session token. Always HttpOnly
/// with Path=/ and a Max-Age matching the token lifetime. Locally the cookie
/// is SameSite=Lax; in production the SPA is served from another origin, so
/// it must be SameSite=None and Secure.
pub fn session_cookie(token: &str, config: &AppConfig) -> String {
    match config.env {
        Env::Production => format!(
            "{AUTH_COOKIE}={token}; HttpOnly; Secure; SameSite=None; Path=/; Max-Age={TOKEN_TTL_SECS}"
        ),
        Env::Local => {
            format!("{AUTH_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={TOKEN_TTL_SECS}")
        }
    }
}

/// clear_session_cookie
///
/// Builds the Set-Cookie value that removes the session cookie on logout.
/// Attributes must mirror [`session_cookie`] or some browsers will keep the
/// original cookie alive.
pub fn clear_session_cookie(config: &AppConfig) -> String {
    match config.env {
        Env::Production => {
            format!("{AUTH_COOKIE}=; HttpOnly; Secure; SameSite=None; Path=/; Max-Age=0")
        }
        Env::Local => format!("{AUTH_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0"),
    }
}

/// extract_session_token
///
/// Scans the request's Cookie headers for the session cookie. Multiple Cookie
/// headers and multiple pairs per header are both legal, so every pair is
/// inspected.
fn extract_session_token(parts: &Parts) -> Option<String> {
    for value in parts.headers.get_all(header::COOKIE) {
        let Ok(raw) = value.to_str() else { continue };
        for pair in raw.split(';') {
            if let Some(token) = pair.trim().strip_prefix(AUTH_COOKIE).and_then(|rest| rest.strip_prefix('=')) {
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }
    None
}

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request. Handlers take this as
/// an argument to get the caller's ID; role gates use it to enforce access.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The unique identifier of the user, mapped to users.id.
    pub id: Uuid,
    /// The user's current role as stored in the database, not as claimed by
    /// the token.
    pub role: Role,
}

/// AuthUser Extractor Implementation
///
/// Implements Axum's FromRequestParts trait, making AuthUser usable as a
/// function argument in any authenticated handler and inside the role-gate
/// middleware.
///
/// The entire process involves:
/// 1. Dependency Resolution: accessing Repository and AppConfig from the
///    application state.
/// 2. Cookie Extraction: reading the session token from the HTTP-only cookie.
/// 3. Token Validation: JWT decoding with strict expiry.
/// 4. DB Lookup: fetching the user's current role and existence, so a deleted
///    user's still-valid token stops working immediately.
///
/// Rejection: an `ApiError` rendering the uniform error envelope, 401 for
/// every authentication failure.
impl<S> FromRequestParts<S> for AuthUser
where
    // S must allow sending across threads and sharing.
    S: Send + Sync,
    // Allows the extractor to pull the Repository State from the app state.
    RepositoryState: FromRef<S>,
    // Allows the extractor to pull the AppConfig (for the JWT secret).
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // 1. Dependency Resolution
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        // 2. Cookie Extraction
        let token = extract_session_token(parts)
            .ok_or_else(|| ApiError::Unauthenticated("Missing session token".to_string()))?;

        // 3. Decode and Validate the Token
        let claims = verify_token(&token, &config.jwt_secret).map_err(|e| {
            let message = match e {
                TokenError::Expired => "Session expired",
                TokenError::InvalidSignature | TokenError::Malformed => "Invalid session token",
            };
            ApiError::Unauthenticated(message.to_string())
        })?;

        // 4. Database Lookup (Final Verification)
        // The token may be cryptographically valid while the user no longer
        // exists, or holds a different role than at issue time.
        let user = repo
            .get_user_by_id(claims.sub)
            .await?
            .ok_or_else(|| ApiError::Unauthenticated("Invalid session token".to_string()))?;

        // Success: Return the resolved identity.
        Ok(AuthUser {
            id: user.id,
            role: user.role,
        })
    }
}

/// require_admin
///
/// Route-layer gate for the /admin group. Runs after AuthUser resolution, so
/// an unauthenticated request gets a 401 from the extractor before this role
/// check can produce its 403.
pub async fn require_admin(
    AuthUser { role, .. }: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if role != Role::Admin {
        return Err(ApiError::Forbidden("Administrator access required".to_string()));
    }
    Ok(next.run(request).await)
}

/// require_user
///
/// Route-layer gate for the /user group. Only Normal Users may rate stores;
/// admins and owners get a 403 here rather than silently acting as raters.
pub async fn require_user(
    AuthUser { role, .. }: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if role != Role::User {
        return Err(ApiError::Forbidden("User access required".to_string()));
    }
    Ok(next.run(request).await)
}

/// require_owner
///
/// Route-layer gate for the /owner group.
pub async fn require_owner(
    AuthUser { role, .. }: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if role != Role::Owner {
        return Err(ApiError::Forbidden("Store owner access required".to_string()));
    }
    Ok(next.run(request).await)
}
