//! The read pipeline: expand every series in a window, drop cancellations,
//! and merge with single events into one ordered agenda.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  Result,
  align::align,
  event::{CanceledOccurrence, Event},
  exceptions::apply_exceptions,
  expand::expand,
  window::DateWindow,
};

/// One displayed occurrence: the event's data with its dates moved to the
/// occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventInstance {
  /// The series this instance was expanded from; `None` for single events.
  pub series_id: Option<Uuid>,
  #[serde(flatten)]
  pub event:     Event,
}

impl EventInstance {
  /// Agenda ordering: by start date, then start time with untimed
  /// instances first.
  pub fn sort_key(&self) -> (NaiveDate, Option<NaiveTime>) {
    (self.event.start_date, self.event.start_time)
  }
}

/// The occurrence dates `series` produces in `window`, before cancellations.
/// A non-recurring event produces none.
pub fn expand_series(series: &Event, window: &DateWindow) -> Result<Vec<NaiveDate>> {
  let Some(rule) = &series.rule else {
    return Ok(Vec::new());
  };
  let bounds = series.bounds()?;
  Ok(
    align(rule, &bounds, window)
      .map(|eff| expand(rule, eff))
      .unwrap_or_default(),
  )
}

/// The occurrence dates `series` produces in `window` once `canceled` dates
/// are removed.
pub fn series_occurrences(
  series: &Event,
  canceled: &[NaiveDate],
  window: &DateWindow,
) -> Result<Vec<NaiveDate>> {
  let dates = expand_series(series, window)?;
  Ok(apply_exceptions(dates, canceled.iter().copied()))
}

/// Merge expanded series and single events into one agenda.
///
/// The sort is stable: on equal keys, series instances keep their place
/// ahead of single events.
pub fn merge(recurring: Vec<(Event, Vec<NaiveDate>)>, single: Vec<Event>) -> Vec<EventInstance> {
  let mut instances: Vec<EventInstance> = recurring
    .into_iter()
    .flat_map(|(series, dates)| {
      dates.into_iter().filter_map(move |date| {
        series.at_occurrence(date).map(|event| EventInstance {
          series_id: Some(series.event_id),
          event,
        })
      })
    })
    .collect();

  instances.extend(single.into_iter().map(|event| EventInstance { series_id: None, event }));
  instances.sort_by_key(EventInstance::sort_key);
  instances
}

/// Run the whole pipeline over already-loaded rows.
///
/// `events` may contain rows that do not touch `window`; they are filtered
/// out here. `cancellations` may belong to any series.
pub fn agenda(
  window: &DateWindow,
  events: &[Event],
  cancellations: &[CanceledOccurrence],
) -> Result<Vec<EventInstance>> {
  let mut canceled: HashMap<Uuid, Vec<NaiveDate>> = HashMap::new();
  for c in cancellations {
    canceled.entry(c.series_id).or_default().push(c.cancel_date);
  }

  let mut recurring = Vec::new();
  let mut single = Vec::new();

  for event in events.iter().filter(|e| e.is_candidate_for(window)) {
    if event.repeats() {
      let dates = series_occurrences(
        event,
        canceled.get(&event.event_id).map(Vec::as_slice).unwrap_or_default(),
        window,
      )?;
      recurring.push((event.clone(), dates));
    } else {
      single.push(event.clone());
    }
  }

  Ok(merge(recurring, single))
}
