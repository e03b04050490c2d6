//! Window alignment: where expansion of a series should begin.
//!
//! Expanding a long-lived series from its very first occurrence for a window
//! years later would walk every period in between. Instead, [`align`] jumps
//! straight to the first period on the rule's grid that can still produce an
//! occurrence overlapping the window, in constant time.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
  calendar::{
    add_days, days_between, first_of_month, first_of_year, monday_of, month_index,
    round_up,
  },
  rule::{Pattern, RecurrenceRule},
  window::{DateWindow, SeriesBounds},
};

/// The inclusive range handed to the generator: `start` lies on the rule's
/// period grid, `until` already honours the series' `end_repeat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveWindow {
  pub start: NaiveDate,
  pub until: NaiveDate,
}

/// Compute the effective window for expanding `rule` over `window`.
///
/// Returns `None` when the series cannot contribute any occurrence to the
/// window (it ends before the window starts, or starts after it ends).
pub fn align(
  rule: &RecurrenceRule,
  bounds: &SeriesBounds,
  window: &DateWindow,
) -> Option<EffectiveWindow> {
  let until = match bounds.end_repeat() {
    Some(end_repeat) => end_repeat.min(window.end()),
    None => window.end(),
  };

  let start = if window.start() <= bounds.end() {
    // The window reaches back to the first occurrence itself.
    bounds.start()
  } else {
    // A multi-day occurrence that began before the window may still
    // overlap it.
    let shift = (bounds.duration_days() - 1).max(0);
    let candidate = add_days(window.start(), -shift)?;
    snap_to_grid(rule, bounds.start(), candidate)?
  };

  (start <= until).then_some(EffectiveWindow { start, until })
}

/// The earliest date `>= candidate` whose period is a whole number of
/// intervals away from the period containing `anchor`.
///
/// A candidate already inside an on-grid period is returned unchanged;
/// otherwise the result is the first day of the next on-grid period.
fn snap_to_grid(
  rule: &RecurrenceRule,
  anchor: NaiveDate,
  candidate: NaiveDate,
) -> Option<NaiveDate> {
  let step = i64::from(rule.interval());

  match rule.pattern() {
    Pattern::Daily => {
      let offset = round_up(days_between(anchor, candidate), step);
      add_days(anchor, offset)
    }
    Pattern::Weekly { .. } => {
      let anchor_week = monday_of(anchor)?;
      let weeks = days_between(anchor_week, monday_of(candidate)?) / 7;
      let target = round_up(weeks, step);
      if target == weeks {
        Some(candidate)
      } else {
        add_days(anchor_week, target * 7)
      }
    }
    Pattern::Monthly { .. } => {
      let months = month_index(candidate) - month_index(anchor);
      let target = round_up(months, step);
      if target == months {
        Some(candidate)
      } else {
        first_of_month(month_index(anchor) + target)
      }
    }
    Pattern::Yearly { .. } => {
      let years = i64::from(candidate.year()) - i64::from(anchor.year());
      let target = round_up(years, step);
      if target == years {
        Some(candidate)
      } else {
        first_of_year(i64::from(anchor.year()) + target)
      }
    }
  }
}
