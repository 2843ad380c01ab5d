//! Forms: the evaluation templates assignments are created against.
//!
//! A form is immutable once created. Its three component weights drive the
//! form-level total in [`crate::summary`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, FormId, Result};

/// Weight assumed when a caller leaves `total_weight` unset or zero.
pub const DEFAULT_TOTAL_WEIGHT: i32 = 100;

// ─── Windows ─────────────────────────────────────────────────────────────────

/// An informational date range. Neither bound is enforced by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
  #[serde(default, deserialize_with = "crate::date::optional")]
  pub start: Option<NaiveDate>,
  #[serde(default, deserialize_with = "crate::date::optional")]
  pub end:   Option<NaiveDate>,
}

/// The optional scheduling windows a form carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormWindows {
  /// When evaluated people may configure their KPIs.
  #[serde(default)]
  pub kpi_config:   DateWindow,
  #[serde(default)]
  pub evaluation:   DateWindow,
  #[serde(default)]
  pub other_leave:  DateWindow,
  #[serde(default)]
  pub annual_leave: DateWindow,
}

// ─── Weights ─────────────────────────────────────────────────────────────────

/// The three component weights, in percentage points.
///
/// They are expected to add up to the form's `total_weight` but nothing
/// enforces it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormWeights {
  pub kpi_weight:  i32,
  pub comp_weight: i32,
  pub ta_weight:   i32,
}

// ─── Form ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
  pub form_id:      FormId,
  pub code:         String,
  pub title:        String,
  pub title_en:     Option<String>,
  #[serde(flatten)]
  pub weights:      FormWeights,
  pub total_weight: i32,
  pub calc_method:  i32,
  pub score_scheme: i32,
  pub windows:      FormWindows,
  pub remark:       Option<String>,
  pub created_at:   DateTime<Utc>,
}

/// Input to [`crate::store::EvaluationStore::create_form`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewForm {
  #[serde(default)]
  pub code:         String,
  pub title:        String,
  pub title_en:     Option<String>,
  #[serde(flatten)]
  pub weights:      FormWeights,
  #[serde(default)]
  pub total_weight: i32,
  #[serde(default)]
  pub calc_method:  i32,
  #[serde(default)]
  pub score_scheme: i32,
  #[serde(default)]
  pub windows:      FormWindows,
  pub remark:       Option<String>,
}

impl NewForm {
  /// Check field ranges and fill in defaults. Returns the input ready to
  /// persist.
  pub fn normalized(mut self) -> Result<Self> {
    if self.title.trim().is_empty() {
      return Err(Error::validation("form title is required"));
    }

    let FormWeights { kpi_weight, comp_weight, ta_weight } = self.weights;
    for (name, w) in [
      ("kpi_weight", kpi_weight),
      ("comp_weight", comp_weight),
      ("ta_weight", ta_weight),
    ] {
      if !(0..=100).contains(&w) {
        return Err(Error::validation(format!(
          "{name} must be between 0 and 100, got {w}"
        )));
      }
    }

    if self.total_weight == 0 {
      self.total_weight = DEFAULT_TOTAL_WEIGHT;
    }
    Ok(self)
  }
}
