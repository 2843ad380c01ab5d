//! Handlers for `/forms` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/forms` | `?limit=` (1..=200, default 50), `?offset=` |
//! | `POST` | `/forms` | `total_weight` defaults to 100 |
//! | `GET`  | `/forms/{form_id}` | 404 if not found |

use std::sync::Arc;

use appraisal_core::{
  FormId,
  form::{Form, NewForm},
  store::{EvaluationStore, FormPage},
};
use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;

use crate::{error::ApiError, extract::Body};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub limit:  Option<i64>,
  pub offset: Option<i64>,
}

/// `GET /forms[?limit=&offset=]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Form>>, ApiError>
where
  S: EvaluationStore,
{
  let page = FormPage::new(params.limit, params.offset);
  let forms = store.list_forms(page).await.map_err(ApiError::store)?;
  Ok(Json(forms))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /forms`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Body(body): Body<NewForm>,
) -> Result<impl IntoResponse, ApiError>
where
  S: EvaluationStore,
{
  let form = store.create_form(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(form)))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /forms/{form_id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(form_id): Path<FormId>,
) -> Result<Json<Form>, ApiError>
where
  S: EvaluationStore,
{
  let form = store
    .get_form(form_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("form {form_id} not found")))?;
  Ok(Json(form))
}
