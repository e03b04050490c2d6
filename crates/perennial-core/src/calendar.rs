//! Calendar arithmetic shared by the aligner and the generator.
//!
//! Every helper returns `None` instead of panicking when a result would fall
//! outside chrono's representable range.

use chrono::{Datelike, Days, NaiveDate};

pub fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
  if days >= 0 {
    date.checked_add_days(Days::new(days.unsigned_abs()))
  } else {
    date.checked_sub_days(Days::new(days.unsigned_abs()))
  }
}

/// Signed number of days from `from` to `to`.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
  to.signed_duration_since(from).num_days()
}

/// The Monday of the ISO week containing `date`.
pub fn monday_of(date: NaiveDate) -> Option<NaiveDate> {
  add_days(date, -i64::from(date.weekday().num_days_from_monday()))
}

/// Months since year 0, so consecutive months differ by one.
pub fn month_index(date: NaiveDate) -> i64 {
  i64::from(date.year()) * 12 + i64::from(date.month0())
}

pub fn first_of_month(index: i64) -> Option<NaiveDate> {
  let year = i32::try_from(index.div_euclid(12)).ok()?;
  let month0 = u32::try_from(index.rem_euclid(12)).ok()?;
  NaiveDate::from_ymd_opt(year, month0 + 1, 1)
}

pub fn first_of_year(year: i64) -> Option<NaiveDate> {
  NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, 1, 1)
}

/// The smallest multiple of `step` that is `>= offset`.
pub fn round_up(offset: i64, step: i64) -> i64 {
  let rem = offset.rem_euclid(step);
  if rem == 0 { offset } else { offset + (step - rem) }
}
