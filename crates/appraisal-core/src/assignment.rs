//! Assignments: the binding of one form to one evaluated person.
//!
//! There is at most one assignment per [`Scope`]. It is created lazily the
//! first time the person touches the form and is never deleted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{AssignmentId, Error, FormId, PersonId, Result};

/// The `(form, person)` pair every per-person operation is addressed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
  pub form_id:   FormId,
  pub person_id: PersonId,
}

impl Scope {
  pub fn new(form_id: FormId, person_id: PersonId) -> Self {
    Self { form_id, person_id }
  }
}

/// Draft assignments accept writes; submitted ones are frozen.
///
/// The only transition is `Draft → Submitted`.
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
pub enum AssignmentStatus {
  #[default]
  Draft,
  Submitted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
  pub assignment_id: AssignmentId,
  pub form_id:       FormId,
  pub person_id:     PersonId,
  pub status:        AssignmentStatus,
  pub due_date:      Option<NaiveDate>,
  pub created_at:    DateTime<Utc>,
}

impl Assignment {
  pub fn scope(&self) -> Scope { Scope::new(self.form_id, self.person_id) }

  /// The status gate every scored-section write passes through.
  pub fn ensure_draft(&self) -> Result<()> {
    match self.status {
      AssignmentStatus::Draft => Ok(()),
      AssignmentStatus::Submitted => {
        Err(Error::AlreadySubmitted(self.assignment_id))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn assignment(status: AssignmentStatus) -> Assignment {
    Assignment {
      assignment_id: 3,
      form_id: 1,
      person_id: 7,
      status,
      due_date: None,
      created_at: Utc::now(),
    }
  }

  #[test]
  fn draft_passes_gate() {
    assert!(assignment(AssignmentStatus::Draft).ensure_draft().is_ok());
  }

  #[test]
  fn submitted_is_rejected_with_its_id() {
    let err = assignment(AssignmentStatus::Submitted)
      .ensure_draft()
      .unwrap_err();
    assert!(matches!(err, Error::AlreadySubmitted(3)));
  }
}
