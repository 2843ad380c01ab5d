//! [`SqliteStore`], the SQLite implementation of [`EvaluationStore`].

use std::{
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::{Duration, Instant},
};

use appraisal_core::{
  FormId, PersonId,
  assignment::{Assignment, AssignmentStatus, Scope},
  form::{Form, NewForm},
  score::{
    CompetencyItem, FormSnapshot, KpiItem, NewCompetency, NewKpi, SaveAll,
  },
  step::{EvalStep, StepStatus, validate_chain},
  store::{EvaluationStore, FormPage, KpiBatch, StepBatch},
  summary::{GradeBand, NewGradeBand},
};
use chrono::{FixedOffset, NaiveDate, Offset as _, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior, params};

use crate::{
  Error, Result,
  encode::{FORM_COLUMNS, RawForm, encode_dt, encode_windows},
  schema::SCHEMA,
  sections, steps,
};

/// Offset used for "today" when none is configured (UTC+07:00).
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 7 * 3600;

/// How long a connection waits for another writer before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// An appraisal store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Separate
/// `open` calls on the same file give independent connections that serialise
/// their writes through SQLite's own locking.
#[derive(Clone)]
pub struct SqliteStore {
  conn:          tokio_rusqlite::Connection,
  local_offset:  FixedOffset,
  write_timeout: Option<Duration>,
}

/// Flags the write as abandoned when the future driving it is dropped.
struct CancelGuard(Arc<AtomicBool>);

impl Drop for CancelGuard {
  fn drop(&mut self) { self.0.store(true, Ordering::Release); }
}

fn default_offset() -> FixedOffset {
  FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self { conn, local_offset: default_offset(), write_timeout: None })
  }

  /// Use `offset` when deciding what "today" is for default due dates.
  pub fn with_local_offset(mut self, offset: FixedOffset) -> Self {
    self.local_offset = offset;
    self
  }

  /// Roll back any write that has not reached its commit within `timeout`.
  pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.write_timeout = timeout;
    self
  }

  /// The current calendar date in the store's local offset.
  pub fn today(&self) -> NaiveDate {
    Utc::now().with_timezone(&self.local_offset).date_naive()
  }

  /// Record a person's display name in the directory mirror used for
  /// evaluator names.
  pub async fn upsert_person(&self, person_id: PersonId, name: &str) -> Result<()> {
    let name = name.to_owned();
    self
      .write("upsert_person", move |tx| {
        tx.execute(
          "INSERT INTO people (person_id, name) VALUES (?1, ?2)
           ON CONFLICT (person_id) DO UPDATE SET name = excluded.name",
          params![person_id, name],
        )?;
        Ok(())
      })
      .await
  }

  /// Occupy the connection thread for `d`.
  #[cfg(test)]
  pub(crate) async fn stall(&self, d: Duration) -> Result<()> {
    self
      .conn
      .call(move |_| {
        std::thread::sleep(d);
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` in one `BEGIN IMMEDIATE` transaction.
  ///
  /// Commits only if `f` succeeds, the caller is still waiting, and the write
  /// deadline has not passed. Otherwise the transaction is dropped, which
  /// rolls every statement back.
  async fn write<T, F>(&self, op: &'static str, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
  {
    let deadline = self.write_timeout.map(|t| Instant::now() + t);
    let cancelled = Arc::new(AtomicBool::new(false));
    let _guard = CancelGuard(cancelled.clone());

    self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Result<T>> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = match f(&tx) {
          Ok(out) => out,
          Err(e) => {
            tracing::debug!(op, error = %e, "write rolled back");
            return Ok(Err(e));
          }
        };
        if cancelled.load(Ordering::Acquire) {
          tracing::warn!(op, "caller went away; rolling back");
          return Ok(Err(Error::Cancelled));
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
          tracing::warn!(op, "write deadline exceeded; rolling back");
          return Ok(Err(appraisal_core::Error::DeadlineExceeded.into()));
        }
        tx.commit()?;
        Ok(Ok(out))
      })
      .await?
  }

  /// Run `f` against one consistent read snapshot.
  async fn read<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
  {
    self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Result<T>> {
        let tx = conn.transaction()?;
        Ok(f(&tx))
      })
      .await?
  }
}

// ─── EvaluationStore impl ────────────────────────────────────────────────────

impl EvaluationStore for SqliteStore {
  type Error = Error;

  // ── Forms ─────────────────────────────────────────────────────────────────

  async fn create_form(&self, input: NewForm) -> Result<Form> {
    let input = input.normalized()?;
    let form = self
      .write("create_form", move |tx| {
        let created_at = Utc::now();
        let [a, b, c, d, e, f, g, h] = encode_windows(&input.windows);
        tx.execute(
          "INSERT INTO forms
             (code, title, title_en, kpi_weight, comp_weight, ta_weight,
              total_weight, calc_method, score_scheme,
              kpi_config_start, kpi_config_end, eval_start, eval_end,
              other_leave_start, other_leave_end,
              annual_leave_start, annual_leave_end, remark, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                   ?14, ?15, ?16, ?17, ?18, ?19)",
          params![
            input.code,
            input.title,
            input.title_en,
            input.weights.kpi_weight,
            input.weights.comp_weight,
            input.weights.ta_weight,
            input.total_weight,
            input.calc_method,
            input.score_scheme,
            a,
            b,
            c,
            d,
            e,
            f,
            g,
            h,
            input.remark,
            encode_dt(created_at),
          ],
        )?;
        Ok(Form {
          form_id: tx.last_insert_rowid(),
          code: input.code,
          title: input.title,
          title_en: input.title_en,
          weights: input.weights,
          total_weight: input.total_weight,
          calc_method: input.calc_method,
          score_scheme: input.score_scheme,
          windows: input.windows,
          remark: input.remark,
          created_at,
        })
      })
      .await?;
    tracing::info!(form_id = form.form_id, title = %form.title, "created form");
    Ok(form)
  }

  async fn get_form(&self, form_id: FormId) -> Result<Option<Form>> {
    self.read(move |conn| sections::load_form(conn, form_id)).await
  }

  async fn list_forms(&self, page: FormPage) -> Result<Vec<Form>> {
    self
      .read(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {FORM_COLUMNS} FROM forms
           ORDER BY created_at DESC, form_id DESC LIMIT ?1 OFFSET ?2"
        ))?;
        let raws = stmt
          .query_map(params![page.limit, page.offset], RawForm::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawForm::into_form).collect()
      })
      .await
  }

  // ── Assignments ───────────────────────────────────────────────────────────

  async fn ensure_assignment(
    &self,
    scope: Scope,
    due_date: Option<NaiveDate>,
  ) -> Result<Assignment> {
    let today = self.today();
    self
      .write("ensure_assignment", move |tx| {
        sections::ensure_assignment(tx, scope, due_date, today)
      })
      .await
  }

  async fn get_assignment(&self, scope: Scope) -> Result<Option<Assignment>> {
    self.read(move |conn| sections::find_assignment(conn, scope)).await
  }

  // ── KPIs ──────────────────────────────────────────────────────────────────

  async fn add_kpis(
    &self,
    scope: Scope,
    due_date: Option<NaiveDate>,
    items: Vec<NewKpi>,
  ) -> Result<KpiBatch> {
    let today = self.today();
    self
      .write("add_kpis", move |tx| {
        let a = sections::ensure_assignment(tx, scope, due_date, today)?;
        a.ensure_draft()?;
        sections::lock_assignment(tx, a.assignment_id)?;
        let items = sections::insert_kpis(tx, a.assignment_id, &items)?;
        Ok(KpiBatch { assignment_id: a.assignment_id, items })
      })
      .await
  }

  async fn replace_kpis(
    &self,
    scope: Scope,
    due_date: Option<NaiveDate>,
    items: Vec<NewKpi>,
  ) -> Result<Vec<KpiItem>> {
    let today = self.today();
    self
      .write("replace_kpis", move |tx| {
        let a = sections::ensure_assignment(tx, scope, due_date, today)?;
        a.ensure_draft()?;
        sections::lock_assignment(tx, a.assignment_id)?;
        sections::delete_kpis(tx, a.assignment_id)?;
        sections::insert_kpis(tx, a.assignment_id, &items)
      })
      .await
  }

  async fn list_kpis(&self, scope: Scope) -> Result<Vec<KpiItem>> {
    self
      .read(move |conn| match sections::find_assignment(conn, scope)? {
        Some(a) => sections::list_kpis(conn, a.assignment_id),
        None => Ok(Vec::new()),
      })
      .await
  }

  async fn update_kpi(
    &self,
    scope: Scope,
    kpi_id: i64,
    fields: NewKpi,
  ) -> Result<Option<KpiItem>> {
    self
      .write("update_kpi", move |tx| {
        let Some(a) = sections::find_assignment(tx, scope)? else {
          return Ok(None);
        };
        a.ensure_draft()?;
        sections::lock_assignment(tx, a.assignment_id)?;
        sections::update_kpi(tx, a.assignment_id, kpi_id, &fields)
      })
      .await
  }

  async fn delete_kpi(&self, scope: Scope, kpi_id: i64) -> Result<bool> {
    self
      .write("delete_kpi", move |tx| {
        let Some(a) = sections::find_assignment(tx, scope)? else {
          return Ok(false);
        };
        a.ensure_draft()?;
        sections::lock_assignment(tx, a.assignment_id)?;
        sections::delete_kpi(tx, a.assignment_id, kpi_id)
      })
      .await
  }

  // ── Competencies ──────────────────────────────────────────────────────────

  async fn add_competencies(
    &self,
    form_id: FormId,
    items: Vec<NewCompetency>,
  ) -> Result<Vec<CompetencyItem>> {
    let items = items
      .into_iter()
      .map(NewCompetency::normalized)
      .collect::<appraisal_core::Result<Vec<_>>>()?;

    self
      .write("add_competencies", move |tx| {
        sections::require_form(tx, form_id)?;
        let mut stmt = tx.prepare(
          "INSERT INTO competency_items
             (form_id, idx, title, max_score, weight, full_total, expected_score)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        let mut out = Vec::with_capacity(items.len());
        for c in items {
          stmt.execute(params![
            form_id,
            c.idx,
            c.title,
            c.max_score,
            c.weight,
            c.full_total,
            c.expected_score,
          ])?;
          out.push(CompetencyItem {
            competency_id: tx.last_insert_rowid(),
            form_id,
            idx: c.idx,
            title: c.title,
            max_score: c.max_score,
            weight: c.weight,
            full_total: c.full_total,
            expected_score: c.expected_score,
          });
        }
        Ok(out)
      })
      .await
  }

  async fn list_competencies(&self, form_id: FormId) -> Result<Vec<CompetencyItem>> {
    self
      .read(move |conn| sections::list_competencies(conn, form_id))
      .await
  }

  // ── Grade bands ───────────────────────────────────────────────────────────

  async fn add_grade_band(&self, input: NewGradeBand) -> Result<GradeBand> {
    input.validate()?;
    self
      .write("add_grade_band", move |tx| {
        if let Some(form_id) = input.form_id {
          sections::require_form(tx, form_id)?;
        }
        tx.execute(
          "INSERT INTO grade_bands (form_id, min_pct, max_pct, grade)
           VALUES (?1, ?2, ?3, ?4)",
          params![input.form_id, input.min_pct, input.max_pct, input.grade],
        )?;
        Ok(GradeBand {
          grade_band_id: tx.last_insert_rowid(),
          form_id:       input.form_id,
          min_pct:       input.min_pct,
          max_pct:       input.max_pct,
          grade:         input.grade,
        })
      })
      .await
  }

  async fn list_grade_bands(
    &self,
    form_id: Option<FormId>,
  ) -> Result<Vec<GradeBand>> {
    self
      .read(move |conn| sections::grade_bands(conn, form_id))
      .await
  }

  // ── Evaluation ────────────────────────────────────────────────────────────

  async fn save_all(&self, scope: Scope, input: SaveAll) -> Result<Assignment> {
    input.validate()?;
    let today = self.today();

    let saved = self
      .write("save_all", move |tx| {
        let a = sections::ensure_assignment(tx, scope, input.due_date, today)?;
        a.ensure_draft()?;
        let id = a.assignment_id;
        sections::lock_assignment(tx, id)?;

        sections::delete_kpis(tx, id)?;
        sections::insert_kpis(tx, id, &input.kpis)?;
        sections::replace_competency_scores(tx, &a, &input.competency_scores)?;
        sections::upsert_time_attendance(tx, id, input.time_attendance)?;
        sections::replace_dev_plan(tx, id, &input.development_plan)?;
        sections::upsert_additional(tx, id, &input.additional)?;

        // Last write of the transaction; nothing after it can fail.
        let status = AssignmentStatus::from(input.status);
        sections::set_status(tx, id, status)?;
        Ok(Assignment { status, ..a })
      })
      .await?;

    if saved.status == AssignmentStatus::Submitted {
      tracing::info!(
        assignment_id = saved.assignment_id,
        form_id = scope.form_id,
        person_id = scope.person_id,
        "assignment submitted"
      );
    }
    Ok(saved)
  }

  async fn compute_summary(
    &self,
    scope: Scope,
  ) -> Result<appraisal_core::summary::Summary> {
    self
      .read(move |conn| {
        let a = sections::find_assignment(conn, scope)?;
        sections::summary_for(conn, scope.form_id, a.map(|a| a.assignment_id))
      })
      .await
  }

  async fn load_form_data(&self, scope: Scope) -> Result<FormSnapshot> {
    self
      .read(move |conn| {
        let Some(a) = sections::find_assignment(conn, scope)? else {
          return Ok(FormSnapshot::empty(scope));
        };
        let id = a.assignment_id;
        Ok(FormSnapshot {
          scope,
          assignment_id: Some(id),
          status: a.status,
          due_date: a.due_date,
          kpis: sections::list_kpis(conn, id)?,
          competencies: sections::competencies_with_scores(
            conn,
            scope.form_id,
            id,
          )?,
          time_attendance: sections::time_attendance(conn, id)?,
          development_plan: sections::dev_plan(conn, id)?,
          additional: sections::additional(conn, id)?,
          summary: sections::summary_for(conn, scope.form_id, Some(id))?,
        })
      })
      .await
  }

  // ── Steps ─────────────────────────────────────────────────────────────────

  async fn add_steps(
    &self,
    scope: Scope,
    evaluators: Vec<PersonId>,
  ) -> Result<StepBatch> {
    validate_chain(&evaluators)?;
    let today = self.today();
    self
      .write("add_steps", move |tx| {
        let a = sections::ensure_assignment(tx, scope, None, today)?;
        let steps = steps::insert_chain(tx, a.assignment_id, &evaluators)?;
        Ok(StepBatch { assignment_id: a.assignment_id, steps })
      })
      .await
  }

  async fn list_steps(&self, scope: Scope) -> Result<Vec<EvalStep>> {
    self
      .read(move |conn| match sections::find_assignment(conn, scope)? {
        Some(a) => steps::list_for_assignment(conn, a.assignment_id),
        None => Ok(Vec::new()),
      })
      .await
  }

  async fn update_step(
    &self,
    form_id: FormId,
    caller: PersonId,
    step_id: i64,
    status: StepStatus,
    eval_date: Option<NaiveDate>,
  ) -> Result<Option<EvalStep>> {
    self
      .write("update_step", move |tx| {
        steps::advance(tx, form_id, caller, step_id, status, eval_date)
      })
      .await
  }
}
