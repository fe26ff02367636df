use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, HeaderValue, Method, header},
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod response;
pub mod validation;

// Module for routing segregation (Public, Admin, User, Owner).
pub mod routes;
use routes::{admin, owner, public, user};

// --- Public Re-exports ---

// Makes core state types easily accessible to the main application entry point (main.rs).
pub use config::AppConfig;
pub use repository::{PostgresRepository, RepositoryState, init_schema};

/// ApiDoc
///
/// This struct auto-generates the OpenAPI documentation (Swagger JSON) for the application.
/// It aggregates all API paths and data schemas that have been decorated with
/// the `#[utoipa::path]` and `#[derive(utoipa::ToSchema)]` macros.
/// The resulting JSON is served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    // List all public handler functions here for documentation generation.
    paths(
        handlers::signup, handlers::signin, handlers::verify, handlers::logout,
        handlers::create_user, handlers::add_store, handlers::get_admin_users,
        handlers::get_admin_stores, handlers::get_store_owners, handlers::get_admin_stats,
        handlers::update_role, handlers::delete_user,
        handlers::get_user_stores, handlers::get_store_details, handlers::submit_rating,
        handlers::update_rating, handlers::get_store_ratings, handlers::get_user_ratings,
        handlers::get_owner_ratings, handlers::get_owner_average, handlers::update_password
    ),
    // List all models (schemas) used in the request/response bodies.
    components(
        schemas(
            models::Role, models::PublicUser, models::Store, models::StoreWithRating,
            models::Rating, models::RatingWithUser, models::RatingWithStore,
            models::RatingSummary, models::DashboardStats, models::OwnedStoreSummary,
            models::StoreOwnerOverview, models::CreateUserRequest, models::SigninRequest,
            models::SigninResponse, models::VerifyResponse, models::CreateStoreRequest,
            models::SubmitRatingRequest, models::UpdateRatingRequest, models::UpdateRoleRequest,
            models::DeleteUserRequest, models::UpdatePasswordRequest,
        )
    ),
    tags(
        (name = "store-ratings", description = "Store Ratings Platform API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Implements the **Unified State Pattern**. This is the single, thread-safe, and immutable
/// container holding all essential application services and configuration.
/// The application state is shared across all incoming requests.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: Abstracts database access via the PgPool connection.
    pub repo: RepositoryState,
    /// Configuration: The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// These implementations allow extractors to selectively pull components from the
// shared AppState. The AuthUser extractor relies on both of them.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the application's entire routing structure, applies global and scoped middleware,
/// and registers the application state.
///
/// Role enforcement happens here, not in handlers: each protected group is
/// nested behind its own `require_*` layer, so a request that reaches a
/// handler has already passed both authentication and the role check.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    // The session rides in a cookie, so the browser only attaches it when the
    // response carries Access-Control-Allow-Credentials. That rules out
    // wildcard origins; the single allowed origin comes from configuration.
    let allowed_origin = state
        .config
        .cors_origin
        .parse::<HeaderValue>()
        .expect("FATAL: CORS_ORIGIN is not a valid header value");
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: health probe and the /auth group.
        .merge(public::public_routes())
        // Admin Routes: nested under '/admin' behind the admin role gate.
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::require_admin,
            )),
        )
        // User Routes: nested under '/user' behind the Normal User gate.
        .nest(
            "/user",
            user::user_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::require_user,
            )),
        )
        // Owner Routes: nested under '/owner' behind the Store Owner gate.
        .nest(
            "/owner",
            owner::owner_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::require_owner,
            )),
        )
        // Apply the Unified State to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers (Applied outermost/first)
    // This section implements the Production Observability Stack.
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: Generates a unique UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: Wraps the entire request/response lifecycle in a tracing span.
                // Uses the `trace_span_logger` to include the generated request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: Ensures the generated x-request-id header is
                // returned to the client and injected into subsequent service calls.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Helper function used by `TraceLayer` to customize the tracing span creation.
/// It extracts the `x-request-id` header (if present) and includes it in the
/// structured logging metadata alongside the HTTP method and URI.
///
/// *Goal*: Ensure every log line for a single request is correlated by a unique ID.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    // The structured log format used by the tracing macros.
    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
