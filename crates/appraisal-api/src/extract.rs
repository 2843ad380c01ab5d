//! Request-body extraction that reports failures in the API's error shape.

use axum::extract::{FromRequest, rejection::JsonRejection};

use crate::error::ApiError;

/// A JSON request body. Unlike [`axum::Json`], a malformed or mistyped body
/// becomes a `VALIDATION` error.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Body<T>(pub T);

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    ApiError::BadRequest(rejection.body_text())
  }
}
