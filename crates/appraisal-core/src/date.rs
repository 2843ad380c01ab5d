//! Lenient calendar-date parsing for request bodies.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

const FORMAT: &str = "%Y-%m-%d";

/// Deserialize an optional `YYYY-MM-DD` date. `null`, a missing field and
/// `""` are all absent.
pub fn optional<'de, D>(de: D) -> Result<Option<NaiveDate>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw: Option<String> = Option::deserialize(de)?;
  match raw.as_deref().map(str::trim) {
    None | Some("") => Ok(None),
    Some(s) => NaiveDate::parse_from_str(s, FORMAT)
      .map(Some)
      .map_err(|e| serde::de::Error::custom(format!("invalid date {s:?}: {e}"))),
  }
}

#[cfg(test)]
mod tests {
  use serde::Deserialize;

  use super::*;

  #[derive(Deserialize)]
  struct Body {
    #[serde(default, deserialize_with = "optional")]
    due: Option<NaiveDate>,
  }

  fn parse(json: &str) -> Result<Option<NaiveDate>, serde_json::Error> {
    serde_json::from_str::<Body>(json).map(|b| b.due)
  }

  #[test]
  fn empty_and_missing_are_absent() {
    assert_eq!(parse(r#"{"due":""}"#).unwrap(), None);
    assert_eq!(parse(r#"{"due":null}"#).unwrap(), None);
    assert_eq!(parse("{}").unwrap(), None);
  }

  #[test]
  fn iso_dates_parse() {
    assert_eq!(
      parse(r#"{"due":"2025-02-28"}"#).unwrap(),
      NaiveDate::from_ymd_opt(2025, 2, 28)
    );
  }

  #[test]
  fn garbage_is_rejected() {
    assert!(parse(r#"{"due":"28/02/2025"}"#).is_err());
  }
}
