//! Core types and trait definitions for the appraisal engine.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! summary calculator and the step state machine live here as plain functions
//! so every backend shares one implementation of the arithmetic and the
//! transition rules.

pub mod assignment;
pub mod date;
pub mod error;
pub mod form;
pub mod score;
pub mod step;
pub mod store;
pub mod summary;

pub use error::{Error, Result};

/// Storage identity of a form.
pub type FormId = i64;
/// Identity of an evaluated person or evaluator, issued by the directory.
pub type PersonId = i64;
/// Storage identity of an assignment.
pub type AssignmentId = i64;
