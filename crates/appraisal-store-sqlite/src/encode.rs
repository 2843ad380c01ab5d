//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and calendar dates as
//! `YYYY-MM-DD`. Status enums are stored as small integers.

use appraisal_core::{
  assignment::{Assignment, AssignmentStatus},
  form::{DateWindow, Form, FormWeights, FormWindows},
  score::DevPlanItem,
  step::{EvalStep, StepStatus},
};
use chrono::{DateTime, NaiveDate, Utc};

use crate::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: Option<NaiveDate>) -> Option<String> {
  d.map(|d| d.format(DATE_FORMAT).to_string())
}

pub fn decode_date(s: Option<&str>) -> Result<Option<NaiveDate>> {
  s.map(|s| {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
      .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
  })
  .transpose()
}

// ─── Statuses ────────────────────────────────────────────────────────────────

pub fn encode_assignment_status(s: AssignmentStatus) -> i64 {
  match s {
    AssignmentStatus::Draft => 0,
    AssignmentStatus::Submitted => 1,
  }
}

pub fn decode_assignment_status(v: i64) -> Result<AssignmentStatus> {
  match v {
    0 => Ok(AssignmentStatus::Draft),
    1 => Ok(AssignmentStatus::Submitted),
    value => Err(Error::UnknownEnum { column: "assignments.status", value }),
  }
}

pub fn encode_step_status(s: StepStatus) -> i64 {
  match s {
    StepStatus::Pending => 0,
    StepStatus::Active => 1,
    StepStatus::Done => 2,
  }
}

pub fn decode_step_status(v: i64) -> Result<StepStatus> {
  match v {
    0 => Ok(StepStatus::Pending),
    1 => Ok(StepStatus::Active),
    2 => Ok(StepStatus::Done),
    value => Err(Error::UnknownEnum { column: "eval_steps.status", value }),
  }
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

pub const FORM_COLUMNS: &str = "form_id, code, title, title_en, kpi_weight, \
  comp_weight, ta_weight, total_weight, calc_method, score_scheme, \
  kpi_config_start, kpi_config_end, eval_start, eval_end, other_leave_start, \
  other_leave_end, annual_leave_start, annual_leave_end, remark, created_at";

/// Values read directly from a `forms` row, selected with [`FORM_COLUMNS`].
pub struct RawForm {
  pub form_id:      i64,
  pub code:         String,
  pub title:        String,
  pub title_en:     Option<String>,
  pub weights:      FormWeights,
  pub total_weight: i32,
  pub calc_method:  i32,
  pub score_scheme: i32,
  /// Start/end pairs in `FormWindows` field order.
  pub windows:      [Option<String>; 8],
  pub remark:       Option<String>,
  pub created_at:   String,
}

impl RawForm {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      form_id:      row.get(0)?,
      code:         row.get(1)?,
      title:        row.get(2)?,
      title_en:     row.get(3)?,
      weights:      FormWeights {
        kpi_weight:  row.get(4)?,
        comp_weight: row.get(5)?,
        ta_weight:   row.get(6)?,
      },
      total_weight: row.get(7)?,
      calc_method:  row.get(8)?,
      score_scheme: row.get(9)?,
      windows:      [
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
        row.get(13)?,
        row.get(14)?,
        row.get(15)?,
        row.get(16)?,
        row.get(17)?,
      ],
      remark:       row.get(18)?,
      created_at:   row.get(19)?,
    })
  }

  pub fn into_form(self) -> Result<Form> {
    let [a, b, c, d, e, f, g, h] = self.windows;
    let window = |start: Option<String>, end: Option<String>| -> Result<DateWindow> {
      Ok(DateWindow {
        start: decode_date(start.as_deref())?,
        end:   decode_date(end.as_deref())?,
      })
    };
    Ok(Form {
      form_id:      self.form_id,
      code:         self.code,
      title:        self.title,
      title_en:     self.title_en,
      weights:      self.weights,
      total_weight: self.total_weight,
      calc_method:  self.calc_method,
      score_scheme: self.score_scheme,
      windows:      FormWindows {
        kpi_config:   window(a, b)?,
        evaluation:   window(c, d)?,
        other_leave:  window(e, f)?,
        annual_leave: window(g, h)?,
      },
      remark:       self.remark,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Flatten form windows into the eight date columns, in [`FORM_COLUMNS`]
/// order.
pub fn encode_windows(w: &FormWindows) -> [Option<String>; 8] {
  [
    encode_date(w.kpi_config.start),
    encode_date(w.kpi_config.end),
    encode_date(w.evaluation.start),
    encode_date(w.evaluation.end),
    encode_date(w.other_leave.start),
    encode_date(w.other_leave.end),
    encode_date(w.annual_leave.start),
    encode_date(w.annual_leave.end),
  ]
}

pub const ASSIGNMENT_COLUMNS: &str =
  "assignment_id, form_id, person_id, status, due_date, created_at";

/// Values read directly from an `assignments` row.
pub struct RawAssignment {
  pub assignment_id: i64,
  pub form_id:       i64,
  pub person_id:     i64,
  pub status:        i64,
  pub due_date:      Option<String>,
  pub created_at:    String,
}

impl RawAssignment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      assignment_id: row.get(0)?,
      form_id:       row.get(1)?,
      person_id:     row.get(2)?,
      status:        row.get(3)?,
      due_date:      row.get(4)?,
      created_at:    row.get(5)?,
    })
  }

  pub fn into_assignment(self) -> Result<Assignment> {
    Ok(Assignment {
      assignment_id: self.assignment_id,
      form_id:       self.form_id,
      person_id:     self.person_id,
      status:        decode_assignment_status(self.status)?,
      due_date:      decode_date(self.due_date.as_deref())?,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

/// Step columns with the evaluator name joined from `people`. Expects the
/// step table aliased as `s`.
pub const STEP_COLUMNS: &str = "s.step_id, s.assignment_id, s.idx, \
  s.evaluator_id, COALESCE(p.name, ''), s.status, s.eval_date";

pub struct RawStep {
  pub step_id:        i64,
  pub assignment_id:  i64,
  pub idx:            i32,
  pub evaluator_id:   i64,
  pub evaluator_name: String,
  pub status:         i64,
  pub eval_date:      Option<String>,
}

impl RawStep {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      step_id:        row.get(0)?,
      assignment_id:  row.get(1)?,
      idx:            row.get(2)?,
      evaluator_id:   row.get(3)?,
      evaluator_name: row.get(4)?,
      status:         row.get(5)?,
      eval_date:      row.get(6)?,
    })
  }

  pub fn into_step(self) -> Result<EvalStep> {
    Ok(EvalStep {
      step_id:        self.step_id,
      assignment_id:  self.assignment_id,
      idx:            self.idx,
      evaluator_id:   self.evaluator_id,
      evaluator_name: self.evaluator_name,
      status:         decode_step_status(self.status)?,
      eval_date:      decode_date(self.eval_date.as_deref())?,
    })
  }
}

pub struct RawDevPlan {
  pub idx:      i32,
  pub content:  String,
  pub priority: String,
  pub timing:   Option<String>,
  pub remarks:  String,
}

impl RawDevPlan {
  pub fn into_item(self) -> Result<DevPlanItem> {
    Ok(DevPlanItem {
      idx:      self.idx,
      content:  self.content,
      priority: self.priority,
      timing:   decode_date(self.timing.as_deref())?,
      remarks:  self.remarks,
    })
  }
}
