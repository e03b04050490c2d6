//! Error types for `perennial-core`.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
  #[error("invalid window: start {start} is after end {end}")]
  InvalidWindow { start: NaiveDate, end: NaiveDate },

  #[error("invalid recurrence rule: {0}")]
  InvalidRule(String),

  #[error("invalid series: {0}")]
  InvalidSeries(String),

  /// A split was requested at a date the series does not cover at all.
  #[error("change date {date} is outside the series (starts {start}, repeats until {end_repeat:?})")]
  ChangeDateOutOfRange {
    date:       NaiveDate,
    start:      NaiveDate,
    end_repeat: Option<NaiveDate>,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
