//! Scored sections of an assignment, and the form-level competency rubric.
//!
//! KPI items, competency scores and development-plan entries are owned as
//! whole sets: every write replaces the set. Time-attendance and the
//! additional answers are singletons and are upserted.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  AssignmentId, Error, FormId, Result,
  assignment::{AssignmentStatus, Scope},
  summary::Summary,
};

// ─── KPI items ───────────────────────────────────────────────────────────────

/// One weighted KPI line, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiItem {
  pub kpi_id:         i64,
  pub assignment_id:  AssignmentId,
  pub idx:            i32,
  pub code:           String,
  pub title:          String,
  pub max_score:      f64,
  /// Percentage points.
  pub weight:         i32,
  pub expected_score: f64,
  pub score:          f64,
  pub note:           String,
  pub measure:        String,
  pub criteria:       String,
  pub unit:           String,
}

/// A KPI line as supplied by the caller. Also used as the full replacement
/// body of the single-row update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewKpi {
  pub idx:            i32,
  pub code:           String,
  pub title:          String,
  pub max_score:      f64,
  pub weight:         i32,
  pub expected_score: f64,
  pub score:          f64,
  pub note:           String,
  pub measure:        String,
  pub criteria:       String,
  pub unit:           String,
}

// ─── Competencies ────────────────────────────────────────────────────────────

/// Normalise a competency weight to a ratio.
///
/// Callers send either a ratio (`0.3`) or a percentage (`30`). Anything at or
/// below one is taken as a ratio. This runs once when a competency is written;
/// stored weights are always ratios.
pub fn weight_ratio(raw: f64) -> f64 {
  if raw <= 1.0 { raw } else { raw / 100.0 }
}

/// A form-level competency rubric line. `weight` is always a ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyItem {
  pub competency_id:  i64,
  pub form_id:        FormId,
  pub idx:            i32,
  pub title:          String,
  pub max_score:      f64,
  pub weight:         f64,
  pub full_total:     f64,
  pub expected_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewCompetency {
  pub idx:            i32,
  pub title:          String,
  pub max_score:      f64,
  /// Ratio or percentage; see [`weight_ratio`].
  pub weight:         f64,
  pub full_total:     f64,
  pub expected_score: f64,
}

impl NewCompetency {
  pub fn normalized(mut self) -> Result<Self> {
    if !self.weight.is_finite() || self.weight < 0.0 {
      return Err(Error::validation(format!(
        "competency weight must be a non-negative number, got {}",
        self.weight
      )));
    }
    self.weight = weight_ratio(self.weight);
    Ok(self)
  }
}

/// A person's score against one competency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompetencyScore {
  pub competency_id: i64,
  pub score:         f64,
  #[serde(default)]
  pub note:          String,
}

/// A competency rubric line joined with the person's score (zero when
/// unscored).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyWithScore {
  #[serde(flatten)]
  pub item:  CompetencyItem,
  pub score: f64,
  pub note:  String,
}

// ─── Singletons and plans ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeAttendance {
  pub full_score: f64,
  pub score:      f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevPlanItem {
  pub idx:      i32,
  pub content:  String,
  /// Free text, conventionally `High`, `Medium` or `Low`.
  pub priority: String,
  #[serde(deserialize_with = "crate::date::optional")]
  pub timing:   Option<NaiveDate>,
  pub remarks:  String,
}

/// The five free-text questions at the end of a form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdditionalAnswers {
  pub q1: String,
  pub q2: String,
  pub q3: String,
  pub q4: String,
  pub q5: String,
}

// ─── SaveAll ─────────────────────────────────────────────────────────────────

/// The status a [`SaveAll`] asks for.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SaveStatus {
  #[default]
  Draft,
  Submitted,
}

impl From<SaveStatus> for AssignmentStatus {
  fn from(s: SaveStatus) -> Self {
    match s {
      SaveStatus::Draft => AssignmentStatus::Draft,
      SaveStatus::Submitted => AssignmentStatus::Submitted,
    }
  }
}

/// The full-form payload written by one atomic save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveAll {
  pub status:            SaveStatus,
  #[serde(deserialize_with = "crate::date::optional")]
  pub due_date:          Option<NaiveDate>,
  pub kpis:              Vec<NewKpi>,
  pub competency_scores: Vec<CompetencyScore>,
  pub time_attendance:   TimeAttendance,
  pub development_plan:  Vec<DevPlanItem>,
  pub additional:        AdditionalAnswers,
}

impl SaveAll {
  /// Shape checks that need no storage access.
  pub fn validate(&self) -> Result<()> {
    let mut seen = HashSet::with_capacity(self.competency_scores.len());
    for cs in &self.competency_scores {
      if !seen.insert(cs.competency_id) {
        return Err(Error::validation(format!(
          "competency {} is scored more than once",
          cs.competency_id
        )));
      }
    }
    Ok(())
  }
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// Everything one person has entered against one form, plus its summary.
///
/// When no assignment exists yet every field is empty or zero and the summary
/// grade is `"N/A"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSnapshot {
  pub scope:            Scope,
  pub assignment_id:    Option<AssignmentId>,
  pub status:           AssignmentStatus,
  pub due_date:         Option<NaiveDate>,
  pub kpis:             Vec<KpiItem>,
  pub competencies:     Vec<CompetencyWithScore>,
  pub time_attendance:  TimeAttendance,
  pub development_plan: Vec<DevPlanItem>,
  pub additional:       AdditionalAnswers,
  pub summary:          Summary,
}

impl FormSnapshot {
  pub fn empty(scope: Scope) -> Self {
    Self {
      scope,
      assignment_id: None,
      status: AssignmentStatus::Draft,
      due_date: None,
      kpis: Vec::new(),
      competencies: Vec::new(),
      time_attendance: TimeAttendance::default(),
      development_plan: Vec::new(),
      additional: AdditionalAnswers::default(),
      summary: Summary::empty(scope.form_id),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ratio_weights_are_kept() {
    assert_eq!(weight_ratio(0.3), 0.3);
    assert_eq!(weight_ratio(1.0), 1.0);
  }

  #[test]
  fn percentage_weights_become_ratios() {
    assert!((weight_ratio(70.0) - 0.7).abs() < 1e-12);
  }

  #[test]
  fn negative_competency_weight_is_rejected() {
    let input = NewCompetency { weight: -5.0, ..Default::default() };
    assert!(matches!(input.normalized(), Err(Error::Validation(_))));
  }

  #[test]
  fn duplicate_competency_scores_are_rejected() {
    let payload = SaveAll {
      competency_scores: vec![
        CompetencyScore { competency_id: 4, score: 1.0, note: String::new() },
        CompetencyScore { competency_id: 4, score: 2.0, note: String::new() },
      ],
      ..Default::default()
    };
    assert!(matches!(payload.validate(), Err(Error::Validation(_))));
  }

  #[test]
  fn save_all_accepts_sparse_json() {
    let payload: SaveAll =
      serde_json::from_str(r#"{"status":"submitted","kpis":[{"title":"Sales","weight":50}]}"#)
        .unwrap();
    assert_eq!(payload.status, SaveStatus::Submitted);
    assert_eq!(payload.kpis[0].weight, 50);
    assert!(payload.development_plan.is_empty());
  }

  #[test]
  fn empty_snapshot_has_na_grade() {
    let snap = FormSnapshot::empty(Scope::new(1, 7));
    assert!(snap.kpis.is_empty());
    assert_eq!(snap.summary.grade, "N/A");
    assert_eq!(snap.time_attendance, TimeAttendance::default());
  }
}
