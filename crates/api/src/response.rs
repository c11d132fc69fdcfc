//! Shared response envelope types for API handlers.
//!
//! Single resources use a `{ "data": ... }` envelope; list endpoints add a
//! `count`.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
///
/// # Example
///
/// ```ignore
/// Ok(Json(DataResponse { data: issue }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// `{ "data": [...], "count": n }` envelope for list endpoints.
#[derive(Debug, Serialize)]
pub struct ListResponse<T: Serialize> {
    pub data: Vec<T>,
    pub count: usize,
}

impl<T: Serialize> From<Vec<T>> for ListResponse<T> {
    fn from(data: Vec<T>) -> Self {
        let count = data.len();
        Self { data, count }
    }
}
