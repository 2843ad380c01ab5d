//! Whole-form endpoints: atomic save, the data snapshot and the summary.

use std::sync::Arc;

use appraisal_core::{
  AssignmentId, FormId,
  assignment::AssignmentStatus,
  score::{FormSnapshot, SaveAll},
  store::EvaluationStore,
  summary::Summary,
};
use axum::{
  Json,
  extract::{Path, State},
};
use serde::Serialize;

use crate::{error::ApiError, extract::Body, identity::Caller};

#[derive(Debug, Serialize)]
pub struct SaveResponse {
  pub assignment_id: AssignmentId,
  pub status:        AssignmentStatus,
  pub summary:       Summary,
}

/// `POST /forms/{form_id}/save`: body: the full form, see [`SaveAll`].
///
/// Responds with the assignment id, its new status and the fresh summary.
/// 409 `ALREADY_SUBMITTED` once the assignment is submitted.
pub async fn save<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Path(form_id): Path<FormId>,
  Body(body): Body<SaveAll>,
) -> Result<Json<SaveResponse>, ApiError>
where
  S: EvaluationStore,
{
  let scope = caller.on(form_id);
  let assignment = store.save_all(scope, body).await.map_err(ApiError::store)?;
  let summary = store
    .compute_summary(scope)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(SaveResponse {
    assignment_id: assignment.assignment_id,
    status: assignment.status,
    summary,
  }))
}

/// `GET /forms/{form_id}/data`: everything the caller has entered; empty
/// sections and an `N/A` grade before the first write.
pub async fn data<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Path(form_id): Path<FormId>,
) -> Result<Json<FormSnapshot>, ApiError>
where
  S: EvaluationStore,
{
  let snapshot = store
    .load_form_data(caller.on(form_id))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(snapshot))
}

/// `GET /forms/{form_id}/summary`
pub async fn summary<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Path(form_id): Path<FormId>,
) -> Result<Json<Summary>, ApiError>
where
  S: EvaluationStore,
{
  let summary = store
    .compute_summary(caller.on(form_id))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(summary))
}
