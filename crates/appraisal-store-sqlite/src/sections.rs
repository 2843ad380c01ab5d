//! Row-level helpers shared by the store's transactions.
//!
//! Every function takes a plain `&Connection`; callers pass an open
//! transaction so the helpers compose into one atomic unit.

use appraisal_core::{
  AssignmentId, FormId,
  assignment::{Assignment, AssignmentStatus, Scope},
  form::Form,
  score::{
    AdditionalAnswers, CompetencyItem, CompetencyScore, CompetencyWithScore,
    DevPlanItem, KpiItem, NewKpi, TimeAttendance,
  },
  summary::{self, CompetencyTerm, GradeBand, Summary},
};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension as _, params};

use crate::{
  Result,
  encode::{
    ASSIGNMENT_COLUMNS, FORM_COLUMNS, RawAssignment, RawDevPlan, RawForm,
    encode_assignment_status, encode_date, encode_dt,
  },
};

// ─── Forms ───────────────────────────────────────────────────────────────────

pub fn load_form(conn: &Connection, form_id: FormId) -> Result<Option<Form>> {
  let raw = conn
    .query_row(
      &format!("SELECT {FORM_COLUMNS} FROM forms WHERE form_id = ?1"),
      [form_id],
      RawForm::from_row,
    )
    .optional()?;
  raw.map(RawForm::into_form).transpose()
}

pub fn form_exists(conn: &Connection, form_id: FormId) -> Result<bool> {
  Ok(
    conn
      .query_row("SELECT 1 FROM forms WHERE form_id = ?1", [form_id], |_| {
        Ok(())
      })
      .optional()?
      .is_some(),
  )
}

/// Fail with `FormNotFound` unless `form_id` exists.
pub fn require_form(conn: &Connection, form_id: FormId) -> Result<()> {
  if form_exists(conn, form_id)? {
    Ok(())
  } else {
    Err(appraisal_core::Error::FormNotFound(form_id).into())
  }
}

// ─── Assignments ─────────────────────────────────────────────────────────────

pub fn find_assignment(
  conn: &Connection,
  scope: Scope,
) -> Result<Option<Assignment>> {
  let raw = conn
    .query_row(
      &format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignments
         WHERE form_id = ?1 AND person_id = ?2"
      ),
      params![scope.form_id, scope.person_id],
      RawAssignment::from_row,
    )
    .optional()?;
  raw.map(RawAssignment::into_assignment).transpose()
}

/// Fetch or create the assignment for `scope`.
///
/// The insert is conflict-tolerant on `(form_id, person_id)`, so a racing
/// creator never produces a second row. A supplied `due_date` overwrites the
/// stored one; a new row without one gets `today`.
pub fn ensure_assignment(
  conn: &Connection,
  scope: Scope,
  due_date: Option<NaiveDate>,
  today: NaiveDate,
) -> Result<Assignment> {
  require_form(conn, scope.form_id)?;

  let now = encode_dt(Utc::now());
  let inserted = conn.execute(
    "INSERT INTO assignments
       (form_id, person_id, status, due_date, created_at, updated_at)
     VALUES (?1, ?2, 0, ?3, ?4, ?4)
     ON CONFLICT (form_id, person_id) DO NOTHING",
    params![
      scope.form_id,
      scope.person_id,
      encode_date(Some(due_date.unwrap_or(today))),
      now,
    ],
  )?;

  if inserted == 1 {
    tracing::debug!(
      form_id = scope.form_id,
      person_id = scope.person_id,
      "created assignment"
    );
  } else if due_date.is_some() {
    conn.execute(
      "UPDATE assignments SET due_date = ?3, updated_at = ?4
       WHERE form_id = ?1 AND person_id = ?2",
      params![scope.form_id, scope.person_id, encode_date(due_date), now],
    )?;
  }

  let raw = conn.query_row(
    &format!(
      "SELECT {ASSIGNMENT_COLUMNS} FROM assignments
       WHERE form_id = ?1 AND person_id = ?2"
    ),
    params![scope.form_id, scope.person_id],
    RawAssignment::from_row,
  )?;
  raw.into_assignment()
}

/// Take the per-assignment write lock.
///
/// Bumping `lock_version` is the first write of every transaction that
/// reads-then-writes an assignment's rows. Two such transactions can never
/// interleave between their read and their write.
pub fn lock_assignment(conn: &Connection, assignment_id: AssignmentId) -> Result<()> {
  conn.execute(
    "UPDATE assignments SET lock_version = lock_version + 1
     WHERE assignment_id = ?1",
    [assignment_id],
  )?;
  Ok(())
}

pub fn set_status(
  conn: &Connection,
  assignment_id: AssignmentId,
  status: AssignmentStatus,
) -> Result<()> {
  conn.execute(
    "UPDATE assignments SET status = ?2, updated_at = ?3
     WHERE assignment_id = ?1",
    params![
      assignment_id,
      encode_assignment_status(status),
      encode_dt(Utc::now())
    ],
  )?;
  Ok(())
}

// ─── KPIs ────────────────────────────────────────────────────────────────────

const KPI_COLUMNS: &str = "kpi_id, assignment_id, idx, code, title, max_score, \
  weight, expected_score, score, note, measure, criteria, unit";

fn kpi_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<KpiItem> {
  Ok(KpiItem {
    kpi_id:         row.get(0)?,
    assignment_id:  row.get(1)?,
    idx:            row.get(2)?,
    code:           row.get(3)?,
    title:          row.get(4)?,
    max_score:      row.get(5)?,
    weight:         row.get(6)?,
    expected_score: row.get(7)?,
    score:          row.get(8)?,
    note:           row.get(9)?,
    measure:        row.get(10)?,
    criteria:       row.get(11)?,
    unit:           row.get(12)?,
  })
}

fn stored_kpi(kpi_id: i64, assignment_id: AssignmentId, k: &NewKpi) -> KpiItem {
  KpiItem {
    kpi_id,
    assignment_id,
    idx: k.idx,
    code: k.code.clone(),
    title: k.title.clone(),
    max_score: k.max_score,
    weight: k.weight,
    expected_score: k.expected_score,
    score: k.score,
    note: k.note.clone(),
    measure: k.measure.clone(),
    criteria: k.criteria.clone(),
    unit: k.unit.clone(),
  }
}

pub fn insert_kpis(
  conn: &Connection,
  assignment_id: AssignmentId,
  items: &[NewKpi],
) -> Result<Vec<KpiItem>> {
  let mut stmt = conn.prepare(
    "INSERT INTO kpi_items
       (assignment_id, idx, code, title, max_score, weight, expected_score,
        score, note, measure, criteria, unit)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
  )?;
  let mut out = Vec::with_capacity(items.len());
  for k in items {
    stmt.execute(params![
      assignment_id,
      k.idx,
      k.code,
      k.title,
      k.max_score,
      k.weight,
      k.expected_score,
      k.score,
      k.note,
      k.measure,
      k.criteria,
      k.unit,
    ])?;
    out.push(stored_kpi(conn.last_insert_rowid(), assignment_id, k));
  }
  Ok(out)
}

pub fn delete_kpis(conn: &Connection, assignment_id: AssignmentId) -> Result<()> {
  conn.execute("DELETE FROM kpi_items WHERE assignment_id = ?1", [
    assignment_id,
  ])?;
  Ok(())
}

pub fn list_kpis(
  conn: &Connection,
  assignment_id: AssignmentId,
) -> Result<Vec<KpiItem>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {KPI_COLUMNS} FROM kpi_items
     WHERE assignment_id = ?1 ORDER BY idx, kpi_id"
  ))?;
  let rows = stmt
    .query_map([assignment_id], kpi_from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

/// Overwrite one KPI row of `assignment_id`. `None` if it has no such row.
pub fn update_kpi(
  conn: &Connection,
  assignment_id: AssignmentId,
  kpi_id: i64,
  k: &NewKpi,
) -> Result<Option<KpiItem>> {
  let changed = conn.execute(
    "UPDATE kpi_items SET
       idx = ?3, code = ?4, title = ?5, max_score = ?6, weight = ?7,
       expected_score = ?8, score = ?9, note = ?10, measure = ?11,
       criteria = ?12, unit = ?13
     WHERE kpi_id = ?1 AND assignment_id = ?2",
    params![
      kpi_id,
      assignment_id,
      k.idx,
      k.code,
      k.title,
      k.max_score,
      k.weight,
      k.expected_score,
      k.score,
      k.note,
      k.measure,
      k.criteria,
      k.unit,
    ],
  )?;
  Ok((changed == 1).then(|| stored_kpi(kpi_id, assignment_id, k)))
}

pub fn delete_kpi(
  conn: &Connection,
  assignment_id: AssignmentId,
  kpi_id: i64,
) -> Result<bool> {
  let removed = conn.execute(
    "DELETE FROM kpi_items WHERE kpi_id = ?1 AND assignment_id = ?2",
    params![kpi_id, assignment_id],
  )?;
  Ok(removed == 1)
}

// ─── Competencies ────────────────────────────────────────────────────────────

const COMPETENCY_COLUMNS: &str = "ci.competency_id, ci.form_id, ci.idx, \
  ci.title, ci.max_score, ci.weight, ci.full_total, ci.expected_score";

pub fn competency_from_row(
  row: &rusqlite::Row<'_>,
) -> rusqlite::Result<CompetencyItem> {
  Ok(CompetencyItem {
    competency_id:  row.get(0)?,
    form_id:        row.get(1)?,
    idx:            row.get(2)?,
    title:          row.get(3)?,
    max_score:      row.get(4)?,
    weight:         row.get(5)?,
    full_total:     row.get(6)?,
    expected_score: row.get(7)?,
  })
}

pub fn list_competencies(
  conn: &Connection,
  form_id: FormId,
) -> Result<Vec<CompetencyItem>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {COMPETENCY_COLUMNS} FROM competency_items ci
     WHERE ci.form_id = ?1 ORDER BY ci.idx, ci.competency_id"
  ))?;
  let rows = stmt
    .query_map([form_id], competency_from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

/// Every competency of the form with this assignment's score, zero when
/// unscored.
pub fn competencies_with_scores(
  conn: &Connection,
  form_id: FormId,
  assignment_id: AssignmentId,
) -> Result<Vec<CompetencyWithScore>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {COMPETENCY_COLUMNS}, COALESCE(cs.score, 0), COALESCE(cs.note, '')
     FROM competency_items ci
     LEFT JOIN competency_scores cs
       ON cs.competency_id = ci.competency_id AND cs.assignment_id = ?2
     WHERE ci.form_id = ?1
     ORDER BY ci.idx, ci.competency_id"
  ))?;
  let rows = stmt
    .query_map(params![form_id, assignment_id], |row| {
      Ok(CompetencyWithScore {
        item:  competency_from_row(row)?,
        score: row.get(8)?,
        note:  row.get(9)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

/// Replace the assignment's competency scores. Every scored competency must
/// belong to the assignment's form.
pub fn replace_competency_scores(
  conn: &Connection,
  assignment: &Assignment,
  scores: &[CompetencyScore],
) -> Result<()> {
  let mut owned = conn.prepare(
    "SELECT 1 FROM competency_items WHERE competency_id = ?1 AND form_id = ?2",
  )?;
  for cs in scores {
    let belongs = owned
      .query_row(params![cs.competency_id, assignment.form_id], |_| Ok(()))
      .optional()?
      .is_some();
    if !belongs {
      return Err(
        appraisal_core::Error::validation(format!(
          "competency {} does not belong to form {}",
          cs.competency_id, assignment.form_id
        ))
        .into(),
      );
    }
  }

  conn.execute("DELETE FROM competency_scores WHERE assignment_id = ?1", [
    assignment.assignment_id,
  ])?;
  let mut insert = conn.prepare(
    "INSERT INTO competency_scores (assignment_id, competency_id, score, note)
     VALUES (?1, ?2, ?3, ?4)",
  )?;
  for cs in scores {
    insert.execute(params![
      assignment.assignment_id,
      cs.competency_id,
      cs.score,
      cs.note
    ])?;
  }
  Ok(())
}

fn competency_terms(
  conn: &Connection,
  assignment_id: AssignmentId,
) -> Result<Vec<CompetencyTerm>> {
  let mut stmt = conn.prepare(
    "SELECT ci.max_score, ci.weight, cs.score
     FROM competency_scores cs
     JOIN competency_items ci ON ci.competency_id = cs.competency_id
     WHERE cs.assignment_id = ?1",
  )?;
  let rows = stmt
    .query_map([assignment_id], |row| {
      Ok(CompetencyTerm {
        max_score: row.get(0)?,
        weight:    row.get(1)?,
        score:     row.get(2)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

// ─── Singletons and plans ────────────────────────────────────────────────────

pub fn upsert_time_attendance(
  conn: &Connection,
  assignment_id: AssignmentId,
  ta: TimeAttendance,
) -> Result<()> {
  conn.execute(
    "INSERT INTO ta_scores (assignment_id, full_score, score)
     VALUES (?1, ?2, ?3)
     ON CONFLICT (assignment_id) DO UPDATE SET
       full_score = excluded.full_score, score = excluded.score",
    params![assignment_id, ta.full_score, ta.score],
  )?;
  Ok(())
}

pub fn time_attendance(
  conn: &Connection,
  assignment_id: AssignmentId,
) -> Result<TimeAttendance> {
  let ta = conn
    .query_row(
      "SELECT full_score, score FROM ta_scores WHERE assignment_id = ?1",
      [assignment_id],
      |row| {
        Ok(TimeAttendance { full_score: row.get(0)?, score: row.get(1)? })
      },
    )
    .optional()?;
  Ok(ta.unwrap_or_default())
}

pub fn replace_dev_plan(
  conn: &Connection,
  assignment_id: AssignmentId,
  items: &[DevPlanItem],
) -> Result<()> {
  conn.execute("DELETE FROM dev_plan_items WHERE assignment_id = ?1", [
    assignment_id,
  ])?;
  let mut stmt = conn.prepare(
    "INSERT INTO dev_plan_items
       (assignment_id, idx, content, priority, timing, remarks)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
  )?;
  for item in items {
    stmt.execute(params![
      assignment_id,
      item.idx,
      item.content,
      item.priority,
      encode_date(item.timing),
      item.remarks,
    ])?;
  }
  Ok(())
}

pub fn dev_plan(
  conn: &Connection,
  assignment_id: AssignmentId,
) -> Result<Vec<DevPlanItem>> {
  let mut stmt = conn.prepare(
    "SELECT idx, content, priority, timing, remarks FROM dev_plan_items
     WHERE assignment_id = ?1 ORDER BY idx, dev_plan_id",
  )?;
  let raws = stmt
    .query_map([assignment_id], |row| {
      Ok(RawDevPlan {
        idx:      row.get(0)?,
        content:  row.get(1)?,
        priority: row.get(2)?,
        timing:   row.get(3)?,
        remarks:  row.get(4)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawDevPlan::into_item).collect()
}

pub fn upsert_additional(
  conn: &Connection,
  assignment_id: AssignmentId,
  a: &AdditionalAnswers,
) -> Result<()> {
  conn.execute(
    "INSERT INTO additional_answers (assignment_id, q1, q2, q3, q4, q5)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
     ON CONFLICT (assignment_id) DO UPDATE SET
       q1 = excluded.q1, q2 = excluded.q2, q3 = excluded.q3,
       q4 = excluded.q4, q5 = excluded.q5",
    params![assignment_id, a.q1, a.q2, a.q3, a.q4, a.q5],
  )?;
  Ok(())
}

pub fn additional(
  conn: &Connection,
  assignment_id: AssignmentId,
) -> Result<AdditionalAnswers> {
  let answers = conn
    .query_row(
      "SELECT q1, q2, q3, q4, q5 FROM additional_answers
       WHERE assignment_id = ?1",
      [assignment_id],
      |row| {
        Ok(AdditionalAnswers {
          q1: row.get(0)?,
          q2: row.get(1)?,
          q3: row.get(2)?,
          q4: row.get(3)?,
          q5: row.get(4)?,
        })
      },
    )
    .optional()?;
  Ok(answers.unwrap_or_default())
}

// ─── Grade bands and summary ─────────────────────────────────────────────────

pub fn grade_band_from_row(
  row: &rusqlite::Row<'_>,
) -> rusqlite::Result<GradeBand> {
  Ok(GradeBand {
    grade_band_id: row.get(0)?,
    form_id:       row.get(1)?,
    min_pct:       row.get(2)?,
    max_pct:       row.get(3)?,
    grade:         row.get(4)?,
  })
}

/// With a form: its own bands and the global ones. Without: every band.
pub fn grade_bands(
  conn: &Connection,
  form_id: Option<FormId>,
) -> Result<Vec<GradeBand>> {
  let mut stmt = conn.prepare(
    "SELECT grade_band_id, form_id, min_pct, max_pct, grade FROM grade_bands
     WHERE ?1 IS NULL OR form_id IS NULL OR form_id = ?1
     ORDER BY min_pct DESC, grade_band_id",
  )?;
  let rows = stmt
    .query_map([form_id], grade_band_from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

/// Weighted summary for one assignment, or the zero summary without one.
pub fn summary_for(
  conn: &Connection,
  form_id: FormId,
  assignment_id: Option<AssignmentId>,
) -> Result<Summary> {
  let Some(assignment_id) = assignment_id else {
    return Ok(Summary::empty(form_id));
  };
  let Some(form) = load_form(conn, form_id)? else {
    return Ok(Summary::empty(form_id));
  };

  let kpis = list_kpis(conn, assignment_id)?;
  let terms = competency_terms(conn, assignment_id)?;
  let ta = time_attendance(conn, assignment_id)?;
  let bands = grade_bands(conn, Some(form_id))?;

  Ok(summary::compute(form_id, form.weights, &kpis, &terms, ta, &bands))
}
