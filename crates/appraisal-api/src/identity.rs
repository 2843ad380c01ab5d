//! Caller identity, taken from the header the upstream auth gateway sets.

use appraisal_core::{FormId, PersonId, assignment::Scope};
use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

/// Header carrying the authenticated person id.
pub const PERSON_HEADER: &str = "x-person-id";

/// The authenticated person making the request. Extraction fails with 401
/// when the header is missing or not an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub PersonId);

impl Caller {
  /// The caller's own assignment scope on `form_id`.
  pub fn on(self, form_id: FormId) -> Scope { Scope::new(form_id, self.0) }
}

impl<S> FromRequestParts<S> for Caller
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    parts
      .headers
      .get(PERSON_HEADER)
      .and_then(|v| v.to_str().ok())
      .and_then(|s| s.trim().parse::<PersonId>().ok())
      .map(Caller)
      .ok_or(ApiError::Unauthorized)
  }
}
