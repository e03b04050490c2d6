//! Occurrence generation: the concrete dates a rule produces.

use chrono::{Datelike, NaiveDate};

use crate::{
  align::EffectiveWindow,
  calendar::{add_days, first_of_month, first_of_year, monday_of, month_index},
  rule::{Pattern, RecurrenceRule},
};

/// Expand `rule` over `window` into ascending, duplicate-free dates, each
/// within `[window.start, window.until]`.
///
/// Periods are counted from the period containing `window.start`, which the
/// aligner guarantees is on the rule's grid. Days that do not exist in a
/// given month (the 31st of April, 29 February of a common year) are skipped.
pub fn expand(rule: &RecurrenceRule, window: EffectiveWindow) -> Vec<NaiveDate> {
  let step = i64::from(rule.interval());
  let pattern = rule.pattern();
  let mut dates = Vec::new();
  let mut index = 0_i64;

  while let Some(period) = period_start(pattern, window.start, index) {
    // Every candidate lies on or after its period's first day.
    if period > window.until {
      break;
    }
    for candidate in candidates(pattern, period) {
      if candidate > window.until {
        break;
      }
      if candidate >= window.start {
        dates.push(candidate);
      }
    }
    index += step;
  }

  dates
}

/// First day of the period `index` periods after the one containing `start`.
fn period_start(pattern: &Pattern, start: NaiveDate, index: i64) -> Option<NaiveDate> {
  match pattern {
    Pattern::Daily => add_days(start, index),
    Pattern::Weekly { .. } => add_days(monday_of(start)?, index.checked_mul(7)?),
    Pattern::Monthly { .. } => first_of_month(month_index(start) + index),
    Pattern::Yearly { .. } => first_of_year(i64::from(start.year()) + index),
  }
}

/// Matching dates inside the period beginning at `period`, ascending.
fn candidates(pattern: &Pattern, period: NaiveDate) -> Vec<NaiveDate> {
  match pattern {
    Pattern::Daily => vec![period],
    Pattern::Weekly { weekdays } => weekdays
      .iter()
      .filter_map(|w| add_days(period, i64::from(w.num_days_from_monday())))
      .collect(),
    Pattern::Monthly { month_days } => month_days
      .iter()
      .filter_map(|&day| NaiveDate::from_ymd_opt(period.year(), period.month(), day))
      .collect(),
    Pattern::Yearly { month, month_days } => month_days
      .iter()
      .filter_map(|&day| NaiveDate::from_ymd_opt(period.year(), *month, day))
      .collect(),
  }
}

#[cfg(test)]
mod tests {
  use chrono::Weekday;

  use super::*;
  use crate::{
    align::align,
    window::{DateWindow, SeriesBounds},
  };

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  /// Align then expand, the way callers use the pair. Every result is
  /// checked for strict ordering before it is returned.
  fn dates(
    rule: &RecurrenceRule,
    series: (NaiveDate, NaiveDate, Option<NaiveDate>),
    window: (NaiveDate, NaiveDate),
  ) -> Vec<NaiveDate> {
    let bounds = SeriesBounds::new(series.0, series.1, series.2).unwrap();
    let window = DateWindow::new(window.0, window.1).unwrap();
    let got = align(rule, &bounds, &window)
      .map(|eff| expand(rule, eff))
      .unwrap_or_default();
    assert_strictly_ascending(&got);
    got
  }

  fn assert_strictly_ascending(dates: &[NaiveDate]) {
    assert!(dates.windows(2).all(|w| w[0] < w[1]), "not strictly ascending: {dates:?}");
  }

  #[test]
  fn daily_interval_one_covers_every_day() {
    let rule = RecurrenceRule::daily(1).unwrap();
    let got = dates(
      &rule,
      (d(2025, 1, 28), d(2025, 1, 28), Some(d(2025, 3, 1))),
      (d(2025, 1, 28), d(2025, 2, 10)),
    );
    assert_eq!(got.len(), 14);
    assert_eq!(got.first(), Some(&d(2025, 1, 28)));
    assert_eq!(got.last(), Some(&d(2025, 2, 10)));
  }

  #[test]
  fn daily_interval_five() {
    let rule = RecurrenceRule::daily(5).unwrap();
    let got = dates(
      &rule,
      (d(2025, 1, 28), d(2025, 1, 28), Some(d(2025, 3, 1))),
      (d(2025, 1, 28), d(2025, 2, 10)),
    );
    assert_eq!(got, vec![d(2025, 1, 28), d(2025, 2, 2), d(2025, 2, 7)]);
  }

  #[test]
  fn daily_interval_ten_multi_day_clipped_by_end_repeat() {
    let rule = RecurrenceRule::daily(10).unwrap();
    let got = dates(
      &rule,
      (d(2025, 1, 28), d(2025, 1, 30), Some(d(2025, 5, 1))),
      (d(2025, 2, 28), d(2025, 6, 10)),
    );
    assert_eq!(got, vec![
      d(2025, 2, 27),
      d(2025, 3, 9),
      d(2025, 3, 19),
      d(2025, 3, 29),
      d(2025, 4, 8),
      d(2025, 4, 18),
      d(2025, 4, 28),
    ]);
  }

  #[test]
  fn weekly_two_weekdays() {
    let rule = RecurrenceRule::weekly(1, [Weekday::Tue, Weekday::Sat]).unwrap();
    let got = dates(
      &rule,
      (d(2025, 3, 15), d(2025, 3, 15), Some(d(2025, 8, 14))),
      (d(2025, 2, 28), d(2025, 4, 10)),
    );
    assert_eq!(got, vec![
      d(2025, 3, 15),
      d(2025, 3, 18),
      d(2025, 3, 22),
      d(2025, 3, 25),
      d(2025, 3, 29),
      d(2025, 4, 1),
      d(2025, 4, 5),
      d(2025, 4, 8),
    ]);
  }

  #[test]
  fn weekly_interval_two_multi_day() {
    let rule = RecurrenceRule::weekly(2, [Weekday::Tue, Weekday::Sat]).unwrap();
    let got = dates(
      &rule,
      (d(2025, 3, 16), d(2025, 3, 18), Some(d(2025, 8, 14))),
      (d(2025, 3, 17), d(2025, 4, 15)),
    );
    assert_eq!(got, vec![d(2025, 3, 25), d(2025, 3, 29), d(2025, 4, 8), d(2025, 4, 12)]);
  }

  #[test]
  fn weekly_far_window_stays_on_grid() {
    let rule = RecurrenceRule::weekly(2, [Weekday::Tue, Weekday::Sat]).unwrap();
    let got = dates(
      &rule,
      (d(2025, 3, 16), d(2025, 3, 16), None),
      (d(2025, 6, 1), d(2025, 6, 20)),
    );
    assert_eq!(got, vec![d(2025, 6, 3), d(2025, 6, 7), d(2025, 6, 17)]);
  }

  #[test]
  fn monthly_excludes_occurrence_before_window() {
    let rule = RecurrenceRule::monthly(1, [15]).unwrap();
    let got = dates(
      &rule,
      (d(2025, 4, 15), d(2025, 4, 15), None),
      (d(2025, 4, 21), d(2025, 8, 21)),
    );
    assert_eq!(got, vec![d(2025, 5, 15), d(2025, 6, 15), d(2025, 7, 15), d(2025, 8, 15)]);
  }

  #[test]
  fn monthly_interval_three_multi_day() {
    let rule = RecurrenceRule::monthly(3, [15]).unwrap();
    let got = dates(
      &rule,
      (d(2025, 4, 15), d(2025, 4, 17), None),
      (d(2025, 5, 21), d(2026, 9, 21)),
    );
    assert_eq!(got, vec![
      d(2025, 7, 15),
      d(2025, 10, 15),
      d(2026, 1, 15),
      d(2026, 4, 15),
      d(2026, 7, 15),
    ]);
  }

  #[test]
  fn monthly_interval_two_first_day_off_rule() {
    let rule = RecurrenceRule::monthly(2, [15]).unwrap();
    let got = dates(
      &rule,
      (d(2025, 4, 12), d(2025, 4, 14), None),
      (d(2025, 4, 13), d(2026, 9, 21)),
    );
    assert_eq!(got, vec![
      d(2025, 4, 15),
      d(2025, 6, 15),
      d(2025, 8, 15),
      d(2025, 10, 15),
      d(2025, 12, 15),
      d(2026, 2, 15),
      d(2026, 4, 15),
      d(2026, 6, 15),
      d(2026, 8, 15),
    ]);
  }

  #[test]
  fn monthly_skips_missing_days() {
    let rule = RecurrenceRule::monthly(1, [30, 31]).unwrap();
    let got = dates(
      &rule,
      (d(2025, 1, 30), d(2025, 1, 30), None),
      (d(2025, 1, 1), d(2025, 4, 30)),
    );
    assert_eq!(got, vec![
      d(2025, 1, 30),
      d(2025, 1, 31),
      d(2025, 3, 30),
      d(2025, 3, 31),
      d(2025, 4, 30),
    ]);
  }

  #[test]
  fn yearly_interval_one() {
    let rule = RecurrenceRule::yearly(1, 5, [9]).unwrap();
    let got = dates(
      &rule,
      (d(2025, 5, 9), d(2025, 5, 9), None),
      (d(2025, 3, 31), d(2026, 9, 21)),
    );
    assert_eq!(got, vec![d(2025, 5, 9), d(2026, 5, 9)]);
  }

  #[test]
  fn yearly_interval_two_multi_day_clipped_by_end_repeat() {
    let rule = RecurrenceRule::yearly(2, 12, [30]).unwrap();
    let got = dates(
      &rule,
      (d(2025, 12, 30), d(2026, 1, 1), Some(d(2033, 3, 20))),
      (d(2025, 12, 31), d(2036, 9, 21)),
    );
    assert_eq!(got, vec![
      d(2025, 12, 30),
      d(2027, 12, 30),
      d(2029, 12, 30),
      d(2031, 12, 30),
    ]);
  }

  #[test]
  fn yearly_leap_day_only_in_leap_years() {
    let rule = RecurrenceRule::yearly(1, 2, [29]).unwrap();
    let got = dates(
      &rule,
      (d(2024, 2, 29), d(2024, 2, 29), None),
      (d(2024, 1, 1), d(2032, 12, 31)),
    );
    assert_eq!(got, vec![d(2024, 2, 29), d(2028, 2, 29), d(2032, 2, 29)]);
  }

  #[test]
  fn far_future_window_matches_full_expansion() {
    let rule = RecurrenceRule::daily(7).unwrap();
    let start = d(2000, 1, 3);
    let window = (d(2030, 6, 1), d(2030, 7, 1));

    let aligned = dates(&rule, (start, start, None), window);

    let from_start = expand(&rule, EffectiveWindow { start, until: window.1 });
    assert_strictly_ascending(&from_start);
    let expected: Vec<_> = from_start.into_iter().filter(|x| *x >= window.0).collect();
    assert_eq!(aligned, expected);
  }

  #[test]
  fn empty_when_window_before_series() {
    let rule = RecurrenceRule::monthly(1, [1]).unwrap();
    let got = dates(
      &rule,
      (d(2025, 6, 1), d(2025, 6, 1), None),
      (d(2025, 1, 1), d(2025, 5, 31)),
    );
    assert!(got.is_empty());
  }

  #[test]
  fn multi_qualifier_rules_are_strictly_ascending() {
    let start = d(2025, 1, 1);
    let rules = [
      RecurrenceRule::weekly(1, [Weekday::Sun, Weekday::Mon, Weekday::Wed, Weekday::Sat])
        .unwrap(),
      RecurrenceRule::weekly(3, [Weekday::Fri, Weekday::Tue, Weekday::Tue]).unwrap(),
      RecurrenceRule::monthly(1, [31, 1, 15, 29, 30]).unwrap(),
      RecurrenceRule::monthly(5, [28, 2, 2]).unwrap(),
      RecurrenceRule::yearly(1, 2, [29, 1, 28]).unwrap(),
    ];
    for rule in &rules {
      let everything = expand(rule, EffectiveWindow { start, until: d(2029, 12, 31) });
      assert_strictly_ascending(&everything);
      assert!(!everything.is_empty());

      // Occurrences span three days, so the aligner looks back one day.
      let windowed = dates(rule, (start, d(2025, 1, 3), None), (d(2026, 7, 9), d(2028, 3, 2)));
      let expected: Vec<_> = everything
        .iter()
        .copied()
        .filter(|x| *x >= d(2026, 7, 8) && *x <= d(2028, 3, 2))
        .collect();
      assert_eq!(windowed, expected);
    }
  }
}
