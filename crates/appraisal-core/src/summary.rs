//! The summary calculator: weighted percentages and grade banding.
//!
//! Everything here is pure. Backends load the rows and call [`compute`]; no
//! rounding is applied, that is left to presentation.

use serde::{Deserialize, Serialize};

use crate::{
  Error, FormId, Result,
  form::FormWeights,
  score::{KpiItem, TimeAttendance},
};

/// Grade reported when no band contains the total.
pub const NO_GRADE: &str = "N/A";

// ─── Grade bands ─────────────────────────────────────────────────────────────

/// A closed percentage range mapped to a grade label. Bands without a form are
/// global fallbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeBand {
  pub grade_band_id: i64,
  pub form_id:       Option<FormId>,
  pub min_pct:       f64,
  pub max_pct:       f64,
  pub grade:         String,
}

impl GradeBand {
  pub fn contains(&self, pct: f64) -> bool {
    self.min_pct <= pct && pct <= self.max_pct
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewGradeBand {
  pub form_id: Option<FormId>,
  pub min_pct: f64,
  pub max_pct: f64,
  pub grade:   String,
}

impl NewGradeBand {
  pub fn validate(&self) -> Result<()> {
    if self.grade.trim().is_empty() {
      return Err(Error::validation("grade label is required"));
    }
    if !(self.min_pct.is_finite() && self.max_pct.is_finite()) {
      return Err(Error::validation("band bounds must be finite"));
    }
    if self.min_pct > self.max_pct {
      return Err(Error::validation(format!(
        "min_pct {} is above max_pct {}",
        self.min_pct, self.max_pct
      )));
    }
    Ok(())
  }
}

/// Pick the band for `pct` among `bands` for `form_id`.
///
/// Form-specific bands win over global ones; within the same scope the band
/// with the highest `min_pct` wins. Bands scoped to other forms are ignored.
pub fn select_band(
  bands: &[GradeBand],
  form_id: FormId,
  pct: f64,
) -> Option<&GradeBand> {
  bands
    .iter()
    .filter(|b| b.form_id.is_none() || b.form_id == Some(form_id))
    .filter(|b| b.contains(pct))
    .max_by(|a, b| {
      let scope = |g: &GradeBand| g.form_id.is_some();
      scope(a)
        .cmp(&scope(b))
        .then(a.min_pct.total_cmp(&b.min_pct))
    })
}

// ─── Components ──────────────────────────────────────────────────────────────

/// Weighted KPI attainment in percent.
///
/// Lines with a non-positive `max_score` add nothing to the numerator but their
/// weight still counts in the denominator.
pub fn kpi_pct(kpis: &[KpiItem]) -> f64 {
  let total_weight: f64 = kpis.iter().map(|k| f64::from(k.weight)).sum();
  if total_weight == 0.0 {
    return 0.0;
  }
  let earned: f64 = kpis
    .iter()
    .filter(|k| k.max_score > 0.0)
    .map(|k| k.score / k.max_score * f64::from(k.weight))
    .sum();
  earned / total_weight * 100.0
}

/// One scored competency, reduced to what the calculator needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompetencyTerm {
  pub max_score: f64,
  /// Stored ratio.
  pub weight:    f64,
  pub score:     f64,
}

pub fn competency_pct(terms: &[CompetencyTerm]) -> f64 {
  terms
    .iter()
    .filter(|t| t.max_score > 0.0)
    .map(|t| t.score / t.max_score * t.weight)
    .sum::<f64>()
    * 100.0
}

pub fn time_attendance_pct(ta: TimeAttendance) -> f64 {
  if ta.full_score > 0.0 {
    ta.score / ta.full_score * 100.0
  } else {
    0.0
  }
}

// ─── Summary ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
  pub form_id:     FormId,
  pub kpi_weight:  i32,
  pub kpi_pct:     f64,
  pub comp_weight: i32,
  pub comp_pct:    f64,
  pub ta_weight:   i32,
  pub ta_pct:      f64,
  pub total_pct:   f64,
  pub grade:       String,
  pub grade_min:   f64,
  pub grade_max:   f64,
}

impl Summary {
  /// The zero summary reported for a person with no assignment.
  pub fn empty(form_id: FormId) -> Self {
    Self {
      form_id,
      kpi_weight: 0,
      kpi_pct: 0.0,
      comp_weight: 0,
      comp_pct: 0.0,
      ta_weight: 0,
      ta_pct: 0.0,
      total_pct: 0.0,
      grade: NO_GRADE.to_owned(),
      grade_min: 0.0,
      grade_max: 0.0,
    }
  }
}

/// Compute a summary from an assignment's loaded rows.
pub fn compute(
  form_id: FormId,
  weights: FormWeights,
  kpis: &[KpiItem],
  competencies: &[CompetencyTerm],
  time_attendance: TimeAttendance,
  bands: &[GradeBand],
) -> Summary {
  let kpi = kpi_pct(kpis);
  let comp = competency_pct(competencies);
  let ta = time_attendance_pct(time_attendance);

  let total = (kpi * f64::from(weights.kpi_weight)
    + comp * f64::from(weights.comp_weight)
    + ta * f64::from(weights.ta_weight))
    / 100.0;

  let (grade, grade_min, grade_max) = match select_band(bands, form_id, total)
  {
    Some(b) => (b.grade.clone(), b.min_pct, b.max_pct),
    None => (NO_GRADE.to_owned(), 0.0, 0.0),
  };

  Summary {
    form_id,
    kpi_weight: weights.kpi_weight,
    kpi_pct: kpi,
    comp_weight: weights.comp_weight,
    comp_pct: comp,
    ta_weight: weights.ta_weight,
    ta_pct: ta,
    total_pct: total,
    grade,
    grade_min,
    grade_max,
  }
}
