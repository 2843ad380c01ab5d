//! Handlers for a form's competency rubric.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/forms/{form_id}/competencies` | |
//! | `POST` | `/forms/{form_id}/competencies` | Body: `{"items": [...]}`; weights as ratio or percentage |

use std::sync::Arc;

use appraisal_core::{
  FormId,
  score::{CompetencyItem, NewCompetency},
  store::EvaluationStore,
};
use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;

use crate::{error::ApiError, extract::Body};

#[derive(Debug, Deserialize)]
pub struct AddBody {
  #[serde(default)]
  pub items: Vec<NewCompetency>,
}

/// `GET /forms/{form_id}/competencies`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Path(form_id): Path<FormId>,
) -> Result<Json<Vec<CompetencyItem>>, ApiError>
where
  S: EvaluationStore,
{
  let items = store
    .list_competencies(form_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(items))
}

/// `POST /forms/{form_id}/competencies`
pub async fn add<S>(
  State(store): State<Arc<S>>,
  Path(form_id): Path<FormId>,
  Body(body): Body<AddBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: EvaluationStore,
{
  if body.items.is_empty() {
    return Err(ApiError::BadRequest("items required".into()));
  }
  let items = store
    .add_competencies(form_id, body.items)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(items)))
}
