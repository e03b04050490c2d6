//! Date windows and series bounds: the validated inputs of the engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// An inclusive `[start, end]` range of calendar dates, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWindow")]
pub struct DateWindow {
  start: NaiveDate,
  end:   NaiveDate,
}

#[derive(Deserialize)]
struct RawWindow {
  start: NaiveDate,
  end:   NaiveDate,
}

impl TryFrom<RawWindow> for DateWindow {
  type Error = Error;

  fn try_from(raw: RawWindow) -> Result<Self> { Self::new(raw.start, raw.end) }
}

impl DateWindow {
  pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
    if start > end {
      return Err(Error::InvalidWindow { start, end });
    }
    Ok(Self { start, end })
  }

  pub fn start(&self) -> NaiveDate { self.start }

  pub fn end(&self) -> NaiveDate { self.end }

  pub fn contains(&self, date: NaiveDate) -> bool {
    self.start <= date && date <= self.end
  }

  /// True if the inclusive span `[from, to]` shares at least one day with
  /// the window.
  pub fn overlaps(&self, from: NaiveDate, to: NaiveDate) -> bool {
    from <= self.end && to >= self.start
  }
}

/// The date bounds of a series: its first occurrence `[start, end]` and the
/// optional last date an occurrence may begin on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesBounds {
  start:      NaiveDate,
  end:        NaiveDate,
  end_repeat: Option<NaiveDate>,
}

impl SeriesBounds {
  pub fn new(
    start: NaiveDate,
    end: NaiveDate,
    end_repeat: Option<NaiveDate>,
  ) -> Result<Self> {
    if end < start {
      return Err(Error::InvalidSeries(format!(
        "end date {end} is before start date {start}"
      )));
    }
    if let Some(until) = end_repeat
      && until < start
    {
      return Err(Error::InvalidSeries(format!(
        "end_repeat {until} is before start date {start}"
      )));
    }
    Ok(Self { start, end, end_repeat })
  }

  pub fn start(&self) -> NaiveDate { self.start }

  pub fn end(&self) -> NaiveDate { self.end }

  pub fn end_repeat(&self) -> Option<NaiveDate> { self.end_repeat }

  /// Length of one occurrence in days beyond its first day (0 for a
  /// single-day event).
  pub fn duration_days(&self) -> i64 {
    self.end.signed_duration_since(self.start).num_days()
  }
}
