//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error body is `{"error": <message>, "code": <CODE>}`. Storage
//! failures that carry no domain error become an opaque 500; their cause is
//! logged, never returned.

use appraisal_core::{Error as DomainError, store::StoreError};
use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("missing or invalid caller identity")]
  Unauthorized,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("store error: {0}")]
  Store(Box<dyn StoreError>),
}

impl ApiError {
  pub fn store<E: StoreError>(e: E) -> Self { ApiError::Store(Box::new(e)) }
}

fn classify(e: &DomainError) -> (StatusCode, &'static str) {
  match e {
    DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION"),
    DomainError::FormNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
    DomainError::AlreadySubmitted(_) => {
      (StatusCode::CONFLICT, "ALREADY_SUBMITTED")
    }
    DomainError::StepsAlreadyExist(_) => {
      (StatusCode::CONFLICT, "STEPS_ALREADY_EXIST")
    }
    DomainError::InvalidTransition { .. } => {
      (StatusCode::CONFLICT, "INVALID_TRANSITION")
    }
    DomainError::AnotherStepActive(_) => {
      (StatusCode::CONFLICT, "STEP_ALREADY_ACTIVE")
    }
    DomainError::DeadlineExceeded => {
      (StatusCode::GATEWAY_TIMEOUT, "DEADLINE_EXCEEDED")
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, code, message) = match &self {
      ApiError::Unauthorized => {
        (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string())
      }
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, "NOT_FOUND", m.clone()),
      ApiError::BadRequest(m) => {
        (StatusCode::BAD_REQUEST, "VALIDATION", m.clone())
      }
      ApiError::Store(e) => match e.domain() {
        Some(domain) => {
          let (status, code) = classify(domain);
          tracing::warn!(%status, error = %domain, "request rejected");
          (status, code, domain.to_string())
        }
        None => {
          tracing::error!(error = %e, "store failure");
          (
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL",
            "internal error".to_owned(),
          )
        }
      },
    };
    (status, Json(json!({ "error": message, "code": code }))).into_response()
  }
}
