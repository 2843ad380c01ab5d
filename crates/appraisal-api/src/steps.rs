//! Handlers for the evaluator-step chain.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/forms/{form_id}/steps` | The caller's chain, by index |
//! | `POST` | `/forms/{form_id}/steps` | Body: `{"evaluators": [ids]}`; the caller is prepended |
//! | `PUT`  | `/forms/{form_id}/steps/{step_id}` | Body: `{"status", "eval_date"?}` |

use std::sync::Arc;

use appraisal_core::{
  FormId, PersonId,
  step::{EvalStep, StepStatus},
  store::EvaluationStore,
};
use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{error::ApiError, extract::Body, identity::Caller};

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /forms/{form_id}/steps`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Path(form_id): Path<FormId>,
) -> Result<Json<Vec<EvalStep>>, ApiError>
where
  S: EvaluationStore,
{
  let steps = store
    .list_steps(caller.on(form_id))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(steps))
}

// ─── Add ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AddBody {
  #[serde(default)]
  pub evaluators: Vec<PersonId>,
}

/// `POST /forms/{form_id}/steps`
///
/// The caller's self-review is always the first step, followed by the
/// listed evaluators in order.
pub async fn add<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Path(form_id): Path<FormId>,
  Body(body): Body<AddBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: EvaluationStore,
{
  if body.evaluators.is_empty() {
    return Err(ApiError::BadRequest("evaluators required".into()));
  }
  let chain: Vec<PersonId> =
    std::iter::once(caller.0).chain(body.evaluators).collect();

  let batch = store
    .add_steps(caller.on(form_id), chain)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(batch)))
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub status:    StepStatus,
  #[serde(default, deserialize_with = "appraisal_core::date::optional")]
  pub eval_date: Option<NaiveDate>,
}

/// `PUT /forms/{form_id}/steps/{step_id}`
///
/// Completing the active step hands the chain to the next evaluator. Only
/// the step's evaluator or the reviewee may update it; anyone else gets 404.
pub async fn update_one<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Path((form_id, step_id)): Path<(FormId, i64)>,
  Body(body): Body<UpdateBody>,
) -> Result<Json<EvalStep>, ApiError>
where
  S: EvaluationStore,
{
  let step = store
    .update_step(form_id, caller.0, step_id, body.status, body.eval_date)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("step {step_id} not found")))?;
  Ok(Json(step))
}
