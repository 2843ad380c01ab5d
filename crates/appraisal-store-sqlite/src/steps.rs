//! The evaluator-step chain.
//!
//! Each mutation takes the assignment's row lock (see
//! [`sections::lock_assignment`]) before reading any step status, so
//! "complete this step, then activate the next if nothing else is active"
//! runs as one critical section per assignment.

use appraisal_core::{
  AssignmentId, FormId, PersonId,
  step::{EvalStep, StepStatus, initial_status},
};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension as _, params};

use crate::{
  Result,
  encode::{
    RawStep, STEP_COLUMNS, decode_step_status, encode_date, encode_dt,
    encode_step_status,
  },
  sections,
};

pub fn list_for_assignment(
  conn: &Connection,
  assignment_id: AssignmentId,
) -> Result<Vec<EvalStep>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {STEP_COLUMNS} FROM eval_steps s
     LEFT JOIN people p ON p.person_id = s.evaluator_id
     WHERE s.assignment_id = ?1 ORDER BY s.idx"
  ))?;
  let raws = stmt
    .query_map([assignment_id], RawStep::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawStep::into_step).collect()
}

fn load_step(conn: &Connection, step_id: i64) -> Result<EvalStep> {
  conn
    .query_row(
      &format!(
        "SELECT {STEP_COLUMNS} FROM eval_steps s
         LEFT JOIN people p ON p.person_id = s.evaluator_id
         WHERE s.step_id = ?1"
      ),
      [step_id],
      RawStep::from_row,
    )?
    .into_step()
}

/// Create the chain for an assignment that has none yet.
pub fn insert_chain(
  conn: &Connection,
  assignment_id: AssignmentId,
  evaluators: &[PersonId],
) -> Result<Vec<EvalStep>> {
  sections::lock_assignment(conn, assignment_id)?;

  let existing: i64 = conn.query_row(
    "SELECT COUNT(*) FROM eval_steps WHERE assignment_id = ?1",
    [assignment_id],
    |row| row.get(0),
  )?;
  if existing > 0 {
    return Err(appraisal_core::Error::StepsAlreadyExist(assignment_id).into());
  }

  let now = encode_dt(Utc::now());
  let mut stmt = conn.prepare(
    "INSERT INTO eval_steps
       (assignment_id, idx, evaluator_id, status, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5)",
  )?;
  for (position, evaluator) in evaluators.iter().enumerate() {
    stmt.execute(params![
      assignment_id,
      position as i64 + 1,
      evaluator,
      encode_step_status(initial_status(position)),
      now,
    ])?;
  }

  tracing::debug!(assignment_id, steps = evaluators.len(), "created step chain");
  list_for_assignment(conn, assignment_id)
}

fn active_elsewhere(
  conn: &Connection,
  assignment_id: AssignmentId,
  step_id: i64,
) -> Result<bool> {
  let n: i64 = conn.query_row(
    "SELECT COUNT(*) FROM eval_steps
     WHERE assignment_id = ?1 AND status = ?2 AND step_id != ?3",
    params![assignment_id, encode_step_status(StepStatus::Active), step_id],
    |row| row.get(0),
  )?;
  Ok(n > 0)
}

/// Move a step to `to`, then hand the chain on when it completes.
///
/// `None` when the step does not exist under `form_id` or belongs to neither
/// `caller`'s review nor `caller` as evaluator. The stored `eval_date` is
/// replaced, so `None` clears it.
pub fn advance(
  conn: &Connection,
  form_id: FormId,
  caller: PersonId,
  step_id: i64,
  to: StepStatus,
  eval_date: Option<NaiveDate>,
) -> Result<Option<EvalStep>> {
  let assignment_id: Option<AssignmentId> = conn
    .query_row(
      "SELECT s.assignment_id FROM eval_steps s
       JOIN assignments a ON a.assignment_id = s.assignment_id
       WHERE s.step_id = ?1 AND a.form_id = ?2
         AND (s.evaluator_id = ?3 OR a.person_id = ?3)",
      params![step_id, form_id, caller],
      |row| row.get(0),
    )
    .optional()?;
  let Some(assignment_id) = assignment_id else {
    return Ok(None);
  };

  sections::lock_assignment(conn, assignment_id)?;

  let (idx, status): (i64, i64) = conn.query_row(
    "SELECT idx, status FROM eval_steps WHERE step_id = ?1",
    [step_id],
    |row| Ok((row.get(0)?, row.get(1)?)),
  )?;
  let from = decode_step_status(status)?;

  if let Err(e) = from.check_transition(step_id, to) {
    tracing::warn!(step_id, %from, %to, "rejected step transition");
    return Err(e.into());
  }
  if to == StepStatus::Active && active_elsewhere(conn, assignment_id, step_id)? {
    return Err(appraisal_core::Error::AnotherStepActive(assignment_id).into());
  }

  let now = encode_dt(Utc::now());
  conn.execute(
    "UPDATE eval_steps
     SET status = ?2, eval_date = ?3, updated_at = ?4
     WHERE step_id = ?1",
    params![step_id, encode_step_status(to), encode_date(eval_date), now],
  )?;

  if to == StepStatus::Done && !active_elsewhere(conn, assignment_id, step_id)? {
    let activated = conn.execute(
      "UPDATE eval_steps SET status = ?4, updated_at = ?5
       WHERE assignment_id = ?1 AND idx = ?2 AND status = ?3",
      params![
        assignment_id,
        idx + 1,
        encode_step_status(StepStatus::Pending),
        encode_step_status(StepStatus::Active),
        now,
      ],
    )?;
    if activated > 0 {
      tracing::info!(assignment_id, idx = idx + 1, "activated next step");
    }
  }

  load_step(conn, step_id).map(Some)
}
