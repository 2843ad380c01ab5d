//! The `EvaluationStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g.
//! `appraisal-store-sqlite`). The HTTP layer depends on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  AssignmentId, Error, FormId, PersonId,
  assignment::{Assignment, Scope},
  form::{Form, NewForm},
  score::{
    CompetencyItem, FormSnapshot, KpiItem, NewCompetency, NewKpi, SaveAll,
  },
  step::{EvalStep, StepStatus},
  summary::{GradeBand, NewGradeBand, Summary},
};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Implemented by backend error types so callers can tell domain failures
/// (validation, already submitted, not found, ...) from storage failures
/// without knowing the backend.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// The domain error behind this failure, or `None` for a storage failure.
  fn domain(&self) -> Option<&Error>;
}

impl StoreError for Error {
  fn domain(&self) -> Option<&Error> { Some(self) }
}

// ─── Query and result types ──────────────────────────────────────────────────

/// Pagination for [`EvaluationStore::list_forms`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormPage {
  pub limit:  u32,
  pub offset: u32,
}

impl FormPage {
  pub const DEFAULT_LIMIT: u32 = 50;
  pub const MAX_LIMIT: u32 = 200;

  /// Build a page from raw query values. Out-of-range limits fall back to the
  /// default; negative offsets become zero.
  pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
    let limit = match limit {
      Some(l) if l > 0 && l <= i64::from(Self::MAX_LIMIT) => l as u32,
      _ => Self::DEFAULT_LIMIT,
    };
    let offset = offset
      .filter(|o| *o > 0)
      .map(|o| u32::try_from(o).unwrap_or(u32::MAX))
      .unwrap_or(0);
    Self { limit, offset }
  }
}

impl Default for FormPage {
  fn default() -> Self { Self::new(None, None) }
}

/// KPI rows written in one call, with the assignment they landed on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiBatch {
  pub assignment_id: AssignmentId,
  pub items:         Vec<KpiItem>,
}

/// A freshly created approval chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepBatch {
  pub assignment_id: AssignmentId,
  pub steps:         Vec<EvalStep>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an appraisal storage backend.
///
/// Every method that writes more than one row is a single all-or-nothing
/// transaction. Writes to an assignment's scored sections fail with
/// [`Error::AlreadySubmitted`] once it is submitted, and leave it untouched.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait EvaluationStore: Send + Sync {
  type Error: StoreError;

  // ── Forms ─────────────────────────────────────────────────────────────

  /// Persist a new form. `total_weight` defaults to 100 when zero.
  fn create_form(
    &self,
    input: NewForm,
  ) -> impl Future<Output = Result<Form, Self::Error>> + Send + '_;

  fn get_form(
    &self,
    form_id: FormId,
  ) -> impl Future<Output = Result<Option<Form>, Self::Error>> + Send + '_;

  /// List forms, newest first.
  fn list_forms(
    &self,
    page: FormPage,
  ) -> impl Future<Output = Result<Vec<Form>, Self::Error>> + Send + '_;

  // ── Assignments ───────────────────────────────────────────────────────

  /// Fetch or create the assignment for `scope`.
  ///
  /// A supplied `due_date` overwrites the stored one. A new assignment with
  /// no due date gets "today" in the store's local time zone. Concurrent
  /// calls for the same scope never create duplicates.
  fn ensure_assignment(
    &self,
    scope: Scope,
    due_date: Option<NaiveDate>,
  ) -> impl Future<Output = Result<Assignment, Self::Error>> + Send + '_;

  fn get_assignment(
    &self,
    scope: Scope,
  ) -> impl Future<Output = Result<Option<Assignment>, Self::Error>> + Send + '_;

  // ── KPIs ──────────────────────────────────────────────────────────────

  /// Ensure the assignment, then append `items` to its KPI set.
  fn add_kpis(
    &self,
    scope: Scope,
    due_date: Option<NaiveDate>,
    items: Vec<NewKpi>,
  ) -> impl Future<Output = Result<KpiBatch, Self::Error>> + Send + '_;

  /// Ensure the assignment, then replace its whole KPI set with `items`.
  fn replace_kpis(
    &self,
    scope: Scope,
    due_date: Option<NaiveDate>,
    items: Vec<NewKpi>,
  ) -> impl Future<Output = Result<Vec<KpiItem>, Self::Error>> + Send + '_;

  /// KPI rows for `scope`, ordered by index then id.
  fn list_kpis(
    &self,
    scope: Scope,
  ) -> impl Future<Output = Result<Vec<KpiItem>, Self::Error>> + Send + '_;

  /// Overwrite one KPI row. `None` if no row with `kpi_id` belongs to
  /// `scope`.
  fn update_kpi(
    &self,
    scope: Scope,
    kpi_id: i64,
    fields: NewKpi,
  ) -> impl Future<Output = Result<Option<KpiItem>, Self::Error>> + Send + '_;

  /// Delete one KPI row. Returns whether a row belonging to `scope` was
  /// removed.
  fn delete_kpi(
    &self,
    scope: Scope,
    kpi_id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Competencies ──────────────────────────────────────────────────────

  /// Append competency rubric lines to a form.
  fn add_competencies(
    &self,
    form_id: FormId,
    items: Vec<NewCompetency>,
  ) -> impl Future<Output = Result<Vec<CompetencyItem>, Self::Error>> + Send + '_;

  fn list_competencies(
    &self,
    form_id: FormId,
  ) -> impl Future<Output = Result<Vec<CompetencyItem>, Self::Error>> + Send + '_;

  // ── Grade bands ───────────────────────────────────────────────────────

  fn add_grade_band(
    &self,
    input: NewGradeBand,
  ) -> impl Future<Output = Result<GradeBand, Self::Error>> + Send + '_;

  /// With a form, the bands that can grade it (its own plus global ones);
  /// without, every band.
  fn list_grade_bands(
    &self,
    form_id: Option<FormId>,
  ) -> impl Future<Output = Result<Vec<GradeBand>, Self::Error>> + Send + '_;

  // ── Evaluation ────────────────────────────────────────────────────────

  /// Write the whole form in one transaction and optionally submit it.
  fn save_all(
    &self,
    scope: Scope,
    input: SaveAll,
  ) -> impl Future<Output = Result<Assignment, Self::Error>> + Send + '_;

  /// Weighted summary for `scope`; the zero summary when there is no
  /// assignment.
  fn compute_summary(
    &self,
    scope: Scope,
  ) -> impl Future<Output = Result<Summary, Self::Error>> + Send + '_;

  /// Everything entered for `scope`; an empty snapshot when there is no
  /// assignment.
  fn load_form_data(
    &self,
    scope: Scope,
  ) -> impl Future<Output = Result<FormSnapshot, Self::Error>> + Send + '_;

  // ── Steps ─────────────────────────────────────────────────────────────

  /// Ensure the assignment and create its approval chain, one step per
  /// evaluator in order. The first step starts active.
  fn add_steps(
    &self,
    scope: Scope,
    evaluators: Vec<PersonId>,
  ) -> impl Future<Output = Result<StepBatch, Self::Error>> + Send + '_;

  /// Steps for `scope`, ordered by index.
  fn list_steps(
    &self,
    scope: Scope,
  ) -> impl Future<Output = Result<Vec<EvalStep>, Self::Error>> + Send + '_;

  /// Set a step's status and date. Completing a step activates the next one
  /// when no other step is active. An absent `eval_date` clears the stored
  /// one.
  ///
  /// Only the step's evaluator or the assignment owner may update it. `None`
  /// if the step does not exist under `form_id` or `caller` is neither;
  /// [`Error::AnotherStepActive`] when activating a step while a different
  /// one is active.
  fn update_step(
    &self,
    form_id: FormId,
    caller: PersonId,
    step_id: i64,
    status: StepStatus,
    eval_date: Option<NaiveDate>,
  ) -> impl Future<Output = Result<Option<EvalStep>, Self::Error>> + Send + '_;
}
