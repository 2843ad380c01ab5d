//! Handlers for `/grade-bands`.

use std::sync::Arc;

use appraisal_core::{
  FormId,
  store::EvaluationStore,
  summary::{GradeBand, NewGradeBand},
};
use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;

use crate::{error::ApiError, extract::Body};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub form_id: Option<FormId>,
}

/// `GET /grade-bands[?form_id=]`: with a form, its own bands plus the global
/// ones.
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<GradeBand>>, ApiError>
where
  S: EvaluationStore,
{
  let bands = store
    .list_grade_bands(params.form_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(bands))
}

/// `POST /grade-bands`: body: `{"form_id"?, "min_pct", "max_pct", "grade"}`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Body(body): Body<NewGradeBand>,
) -> Result<impl IntoResponse, ApiError>
where
  S: EvaluationStore,
{
  let band = store.add_grade_band(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(band)))
}
