//! JSON REST API for the appraisal engine.
//!
//! Exposes an axum [`Router`] backed by any
//! [`appraisal_core::store::EvaluationStore`]. Authentication happens
//! upstream; the authenticated person arrives in the `x-person-id` header (see
//! [`identity`]). TLS and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .merge(appraisal_api::api_router(store.clone()))
//! ```

pub mod competencies;
pub mod error;
pub mod evaluation;
pub mod extract;
pub mod forms;
pub mod grade_bands;
pub mod identity;
pub mod kpis;
pub mod steps;

use std::sync::Arc;

use appraisal_core::store::EvaluationStore;
use axum::{
  Router,
  routing::{get, post, put},
};

pub use error::ApiError;
pub use identity::Caller;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: EvaluationStore + 'static,
{
  Router::new()
    .route("/healthz", get(healthz))
    // Forms
    .route("/forms", get(forms::list::<S>).post(forms::create::<S>))
    .route("/forms/{form_id}", get(forms::get_one::<S>))
    // KPIs
    .route(
      "/forms/{form_id}/kpis",
      get(kpis::list::<S>)
        .post(kpis::add::<S>)
        .put(kpis::replace::<S>),
    )
    .route(
      "/forms/{form_id}/kpis/{kpi_id}",
      put(kpis::update_one::<S>).delete(kpis::delete_one::<S>),
    )
    // Competencies and grade bands
    .route(
      "/forms/{form_id}/competencies",
      get(competencies::list::<S>).post(competencies::add::<S>),
    )
    .route(
      "/grade-bands",
      get(grade_bands::list::<S>).post(grade_bands::create::<S>),
    )
    // Whole-form evaluation
    .route("/forms/{form_id}/save", post(evaluation::save::<S>))
    .route("/forms/{form_id}/data", get(evaluation::data::<S>))
    .route("/forms/{form_id}/summary", get(evaluation::summary::<S>))
    // Steps
    .route(
      "/forms/{form_id}/steps",
      get(steps::list::<S>).post(steps::add::<S>),
    )
    .route("/forms/{form_id}/steps/{step_id}", put(steps::update_one::<S>))
    .with_state(store)
}

/// `GET /healthz`
async fn healthz() -> &'static str { "ok" }
