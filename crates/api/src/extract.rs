//! Request body and query extractors that reject in the API's error envelope.
//!
//! axum's stock [`Json`] and [`Query`] answer a bad payload with a plain-text
//! 422. These wrappers turn the same rejections into
//! [`CoreError::Validation`], so clients always get a 400 with
//! `{"error", "code": "VALIDATION_ERROR"}`.
//!
//! ```ignore
//! async fn create(AppJson(input): AppJson<CreateIssue>) -> AppResult<...> { ... }
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use issuefleet_core::error::CoreError;

use crate::error::AppError;

/// JSON request body.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(CoreError::Validation(rejection.body_text()).into()),
        }
    }
}

/// URL query string.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(AppQuery(value)),
            Err(rejection) => Err(CoreError::Validation(rejection.body_text()).into()),
        }
    }
}
