use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;

use crate::error::ApiError;

/// ApiResponse
///
/// Wrapper for successful API responses that adds the uniform
/// `{status: "success", data: ...}` envelope. Pairs with `ApiError`, which
/// renders the matching `{status: "error", error: ...}` shape, so every
/// response body the service emits has the same top-level contract.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 OK with the success envelope.
    pub fn ok(data: T) -> Self {
        Self {
            data,
            status_code: StatusCode::OK,
        }
    }

    /// 201 Created with the success envelope.
    pub fn created(data: T) -> Self {
        Self {
            data,
            status_code: StatusCode::CREATED,
        }
    }

    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self { data, status_code }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let data_value = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize response data");
                return ApiError::Internal.into_response();
            }
        };

        let envelope = json!({
            "status": "success",
            "data": data_value,
        });

        (self.status_code, Json(envelope)).into_response()
    }
}

/// The standard return type for handlers: enveloped success or taxonomy error.
pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// ValidJson
///
/// Drop-in replacement for `axum::Json` as an extractor. A body that is missing,
/// malformed, or fails deserialization is rejected with a 400 in the error
/// envelope instead of axum's plain-text default, keeping the response contract
/// uniform even before a handler runs.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = axum::extract::rejection::JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidJson(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

/// ValidQuery
///
/// The query-string counterpart of [`ValidJson`]: an unparseable query (for
/// example `role=banana` against a typed filter) answers with a 400 in the
/// error envelope instead of axum's plain-text rejection.
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ValidQuery(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}
