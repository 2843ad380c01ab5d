//! SQLite backend for the appraisal engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every multi-row write is a single
//! `BEGIN IMMEDIATE` transaction.

mod encode;
mod schema;
mod sections;
mod steps;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
