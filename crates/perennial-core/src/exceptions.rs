//! Exception overlay: removing canceled occurrences from an expansion.

use std::collections::BTreeSet;

use chrono::NaiveDate;

/// Remove every date in `canceled` from `dates`, preserving order.
///
/// Matching is exact on the occurrence date. A canceled date that the rule
/// never generated simply matches nothing.
pub fn apply_exceptions(
  dates: Vec<NaiveDate>,
  canceled: impl IntoIterator<Item = NaiveDate>,
) -> Vec<NaiveDate> {
  let canceled: BTreeSet<NaiveDate> = canceled.into_iter().collect();
  if canceled.is_empty() {
    return dates;
  }
  dates.into_iter().filter(|d| !canceled.contains(d)).collect()
}
