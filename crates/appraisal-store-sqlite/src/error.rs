//! Error type for `appraisal-store-sqlite`.

use appraisal_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] appraisal_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown {column} value in database: {value}")]
  UnknownEnum { column: &'static str, value: i64 },

  /// The caller went away before the transaction committed; it was rolled
  /// back.
  #[error("operation cancelled; transaction rolled back")]
  Cancelled,
}

impl StoreError for Error {
  fn domain(&self) -> Option<&appraisal_core::Error> {
    match self {
      Error::Core(e) => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
