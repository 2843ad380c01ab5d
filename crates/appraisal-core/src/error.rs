//! Error types for `appraisal-core`.
//!
//! These are the domain failures every backend reports. Storage backends wrap
//! them next to their own connectivity and decoding errors; see
//! [`crate::store::StoreError`].

use thiserror::Error;

use crate::{AssignmentId, FormId, step::StepStatus};

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation failed: {0}")]
  Validation(String),

  #[error("assignment {0} is already submitted and cannot be modified")]
  AlreadySubmitted(AssignmentId),

  #[error("form not found: {0}")]
  FormNotFound(FormId),

  #[error("assignment {0} already has evaluation steps")]
  StepsAlreadyExist(AssignmentId),

  #[error("step {step_id} cannot move from {from} to {to}")]
  InvalidTransition {
    step_id: i64,
    from:    StepStatus,
    to:      StepStatus,
  },

  /// Activating a step while another step of the same assignment is active.
  #[error("assignment {0} already has an active step")]
  AnotherStepActive(AssignmentId),

  #[error("deadline exceeded; transaction rolled back")]
  DeadlineExceeded,
}

impl Error {
  pub fn validation(msg: impl Into<String>) -> Self {
    Self::Validation(msg.into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
