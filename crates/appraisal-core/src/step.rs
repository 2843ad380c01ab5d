//! Evaluator steps: the sequential approval chain of an assignment.
//!
//! Each step moves `Pending → Active → Done`. Completing a step hands the
//! chain to the next index, and at most one step of an assignment is active at
//! any committed instant. The locking that upholds that lives in the backend;
//! the rules for a single step live here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{AssignmentId, Error, PersonId, Result};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StepStatus {
  Pending,
  Active,
  Done,
}

impl StepStatus {
  pub fn is_terminal(self) -> bool { matches!(self, Self::Done) }

  /// Check that a step currently in `self` may be set to `to`.
  ///
  /// Status never moves backwards and nothing leaves `Done`. Re-asserting
  /// `Pending` or `Active` is allowed so the evaluation date can be amended.
  pub fn check_transition(self, step_id: i64, to: StepStatus) -> Result<()> {
    if self.is_terminal() || to < self {
      return Err(Error::InvalidTransition { step_id, from: self, to });
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalStep {
  pub step_id:        i64,
  pub assignment_id:  AssignmentId,
  /// 1-based position in the chain.
  pub idx:            i32,
  pub evaluator_id:   PersonId,
  /// From the person directory; empty when the evaluator is unknown there.
  pub evaluator_name: String,
  pub status:         StepStatus,
  pub eval_date:      Option<NaiveDate>,
}

/// The initial status of the step at 0-based `position` in a new chain.
pub fn initial_status(position: usize) -> StepStatus {
  if position == 0 {
    StepStatus::Active
  } else {
    StepStatus::Pending
  }
}

/// Validate an evaluator list before a chain is created.
pub fn validate_chain(evaluators: &[PersonId]) -> Result<()> {
  if evaluators.is_empty() {
    return Err(Error::validation("at least one evaluator is required"));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn chain_starts_with_one_active_step() {
    let statuses: Vec<_> = (0..3).map(initial_status).collect();
    assert_eq!(
      statuses,
      [StepStatus::Active, StepStatus::Pending, StepStatus::Pending]
    );
  }

  #[test]
  fn forward_transitions_are_allowed() {
    use StepStatus::*;
    assert!(Pending.check_transition(1, Active).is_ok());
    assert!(Active.check_transition(1, Done).is_ok());
    assert!(Pending.check_transition(1, Done).is_ok());
    assert!(Active.check_transition(1, Active).is_ok());
  }

  #[test]
  fn done_is_terminal() {
    use StepStatus::*;
    for to in [Pending, Active, Done] {
      assert!(matches!(
        Done.check_transition(9, to),
        Err(Error::InvalidTransition { step_id: 9, from: Done, .. })
      ));
    }
  }

  #[test]
  fn active_cannot_return_to_pending() {
    assert!(
      StepStatus::Active
        .check_transition(1, StepStatus::Pending)
        .is_err()
    );
  }

  #[test]
  fn empty_chain_is_invalid() {
    assert!(matches!(validate_chain(&[]), Err(Error::Validation(_))));
  }

  #[test]
  fn status_serializes_lowercase() {
    assert_eq!(
      serde_json::to_string(&StepStatus::Done).unwrap(),
      "\"done\""
    );
    assert_eq!(StepStatus::Active.to_string(), "active");
  }
}
