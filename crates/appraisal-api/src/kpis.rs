//! Handlers for the caller's KPI lines on a form.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/forms/{form_id}/kpis` | Ordered by index, then id |
//! | `POST`   | `/forms/{form_id}/kpis` | Append; creates the assignment |
//! | `PUT`    | `/forms/{form_id}/kpis` | Replace the whole set |
//! | `PUT`    | `/forms/{form_id}/kpis/{kpi_id}` | Overwrite one line |
//! | `DELETE` | `/forms/{form_id}/kpis/{kpi_id}` | 204, or 404 |
//!
//! Every route acts on the caller's own assignment only.

use std::sync::Arc;

use appraisal_core::{
  FormId,
  score::{KpiItem, NewKpi},
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

/// Body of the bulk KPI routes.
#[derive(Debug, Deserialize)]
pub struct KpiBody {
  #[serde(default, deserialize_with = "appraisal_core::date::optional")]
  pub due_date: Option<NaiveDate>,
  #[serde(default)]
  pub items:    Vec<NewKpi>,
}

impl KpiBody {
  fn non_empty(self) -> Result<Self, ApiError> {
    if self.items.is_empty() {
      return Err(ApiError::BadRequest("items required".into()));
    }
    Ok(self)
  }
}

/// `GET /forms/{form_id}/kpis`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Path(form_id): Path<FormId>,
) -> Result<Json<Vec<KpiItem>>, ApiError>
where
  S: EvaluationStore,
{
  let kpis = store
    .list_kpis(caller.on(form_id))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(kpis))
}

/// `POST /forms/{form_id}/kpis`: body: `{"due_date"?, "items": [...]}`
pub async fn add<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Path(form_id): Path<FormId>,
  Body(body): Body<KpiBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: EvaluationStore,
{
  let body = body.non_empty()?;
  let batch = store
    .add_kpis(caller.on(form_id), body.due_date, body.items)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(batch)))
}

/// `PUT /forms/{form_id}/kpis`: same body as `POST`.
pub async fn replace<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Path(form_id): Path<FormId>,
  Body(body): Body<KpiBody>,
) -> Result<Json<Vec<KpiItem>>, ApiError>
where
  S: EvaluationStore,
{
  let body = body.non_empty()?;
  let items = store
    .replace_kpis(caller.on(form_id), body.due_date, body.items)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(items))
}

/// `PUT /forms/{form_id}/kpis/{kpi_id}`: body: one full KPI line.
pub async fn update_one<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Path((form_id, kpi_id)): Path<(FormId, i64)>,
  Body(body): Body<NewKpi>,
) -> Result<Json<KpiItem>, ApiError>
where
  S: EvaluationStore,
{
  let item = store
    .update_kpi(caller.on(form_id), kpi_id, body)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("kpi {kpi_id} not found")))?;
  Ok(Json(item))
}

/// `DELETE /forms/{form_id}/kpis/{kpi_id}`
pub async fn delete_one<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Path((form_id, kpi_id)): Path<(FormId, i64)>,
) -> Result<StatusCode, ApiError>
where
  S: EvaluationStore,
{
  let removed = store
    .delete_kpi(caller.on(form_id), kpi_id)
    .await
    .map_err(ApiError::store)?;
  if removed {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::NotFound(format!("kpi {kpi_id} not found")))
  }
}
