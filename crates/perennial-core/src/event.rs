//! Events, single or recurring, and the records attached to a series.
//!
//! A recurring event row is the *series*: its own dates are the first
//! occurrence, and its rule generates the rest. Every other displayed
//! occurrence is derived at read time and never stored.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Result,
  calendar::add_days,
  rule::RecurrenceRule,
  window::{DateWindow, SeriesBounds},
};

// ─── Event ───────────────────────────────────────────────────────────────────

/// A calendar event. With a `rule` it is a series whose first occurrence spans
/// `start_date..=end_date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
  pub event_id:   Uuid,
  pub title:      String,
  pub location:   Option<String>,
  pub start_date: NaiveDate,
  pub end_date:   NaiveDate,
  pub start_time: Option<NaiveTime>,
  pub end_time:   Option<NaiveTime>,
  /// No occurrence begins after this date. `None` repeats indefinitely.
  pub end_repeat: Option<NaiveDate>,
  pub rule:       Option<RecurrenceRule>,
  /// Participants; opaque user identifiers.
  pub members:    Vec<Uuid>,
}

impl Event {
  pub fn repeats(&self) -> bool { self.rule.is_some() }

  /// Validated date bounds of the series.
  pub fn bounds(&self) -> Result<SeriesBounds> {
    SeriesBounds::new(self.start_date, self.end_date, self.end_repeat)
  }

  pub fn validate(&self) -> Result<()> { self.bounds().map(|_| ()) }

  pub fn duration_days(&self) -> i64 {
    self.end_date.signed_duration_since(self.start_date).num_days()
  }

  /// Whether the event can contribute anything to `window`: a single event
  /// must overlap it, a series must start by its end and not have stopped
  /// repeating before its start.
  pub fn is_candidate_for(&self, window: &DateWindow) -> bool {
    if self.repeats() {
      self.start_date <= window.end()
        && self.end_repeat.is_none_or(|until| until >= window.start())
    } else {
      window.overlaps(self.start_date, self.end_date)
    }
  }

  /// A copy of this event moved to begin on `date`, keeping its duration.
  pub fn at_occurrence(&self, date: NaiveDate) -> Option<Event> {
    let end_date = add_days(date, self.duration_days())?;
    Some(Event { start_date: date, end_date, ..self.clone() })
  }
}

// ─── NewEvent ────────────────────────────────────────────────────────────────

/// Input to [`crate::store::EventStore::create_event`]. The id is assigned by
/// the store.
#[derive(Debug, Clone)]
pub struct NewEvent {
  pub title:      String,
  pub location:   Option<String>,
  pub start_date: NaiveDate,
  pub end_date:   NaiveDate,
  pub start_time: Option<NaiveTime>,
  pub end_time:   Option<NaiveTime>,
  pub end_repeat: Option<NaiveDate>,
  pub rule:       Option<RecurrenceRule>,
  pub members:    Vec<Uuid>,
}

impl NewEvent {
  /// A single all-day event on `date` with no optional fields set.
  pub fn new(title: impl Into<String>, date: NaiveDate) -> Self {
    Self {
      title:      title.into(),
      location:   None,
      start_date: date,
      end_date:   date,
      start_time: None,
      end_time:   None,
      end_repeat: None,
      rule:       None,
      members:    Vec::new(),
    }
  }

  pub fn into_event(self, event_id: Uuid) -> Event {
    Event {
      event_id,
      title: self.title,
      location: self.location,
      start_date: self.start_date,
      end_date: self.end_date,
      start_time: self.start_time,
      end_time: self.end_time,
      end_repeat: self.end_repeat,
      rule: self.rule,
      members: self.members,
    }
  }
}

// ─── EventPatch ──────────────────────────────────────────────────────────────

/// The fields a user changed when editing an event or a part of a series.
/// `None` leaves the field untouched; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPatch {
  pub title:      Option<String>,
  pub location:   Option<Option<String>>,
  pub start_time: Option<Option<NaiveTime>>,
  pub end_time:   Option<Option<NaiveTime>>,
  pub members:    Option<Vec<Uuid>>,
  /// Only honoured on series rows.
  pub rule:       Option<RecurrenceRule>,
  /// Only honoured on series rows.
  pub end_repeat: Option<Option<NaiveDate>>,
}

impl EventPatch {
  pub fn is_empty(&self) -> bool { *self == Self::default() }

  /// Overlay the patch onto a series (or single event) row.
  pub fn apply_to_series(&self, event: &mut Event) {
    self.apply_to_occurrence(event);
    if let Some(rule) = &self.rule {
      event.rule = Some(rule.clone());
    }
    if let Some(end_repeat) = self.end_repeat {
      event.end_repeat = end_repeat;
    }
  }

  /// Overlay the descriptive fields onto a standalone occurrence.
  pub fn apply_to_occurrence(&self, event: &mut Event) {
    if let Some(title) = &self.title {
      event.title.clone_from(title);
    }
    if let Some(location) = &self.location {
      event.location.clone_from(location);
    }
    if let Some(start_time) = self.start_time {
      event.start_time = start_time;
    }
    if let Some(end_time) = self.end_time {
      event.end_time = end_time;
    }
    if let Some(members) = &self.members {
      event.members.clone_from(members);
    }
  }
}

// ─── CanceledOccurrence ──────────────────────────────────────────────────────

/// One suppressed occurrence of a series, identified by its start date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanceledOccurrence {
  pub series_id:   Uuid,
  pub cancel_date: NaiveDate,
}
