//! Series splitting: planning edits and deletions of part of a series.
//!
//! [`split_series`] is pure: it describes the rows to write as a
//! [`SeriesMutation`], and a store applies that description in a single
//! transaction. Readers therefore never observe a truncated series without
//! its continuation, or a cancellation without its replacement event.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  event::{CanceledOccurrence, Event, EventPatch},
};

/// Which occurrences an edit or deletion applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitScope {
  /// Only the occurrence starting on the change date.
  One,
  /// The occurrence on the change date and every later one.
  Future,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitOperation {
  Edit(EventPatch),
  Delete,
}

/// The writes that implement one edit or deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesMutation {
  /// Suppress one occurrence. When editing, `detached` is the standalone
  /// event that replaces it.
  Cancel {
    cancellation: CanceledOccurrence,
    detached:     Option<Event>,
  },
  /// Rewrite the row in place.
  UpdateInPlace {
    event:            Event,
    /// The row's `end_repeat` when the plan was made.
    prior_end_repeat: Option<NaiveDate>,
  },
  /// Stop the series after `end_repeat` (the day before `change_date`).
  /// When editing, `continuation` carries the occurrences from
  /// `change_date` onwards as a new series.
  ///
  /// A store only applies this while the row still has `prior_end_repeat`.
  Truncate {
    event_id:         Uuid,
    end_repeat:       NaiveDate,
    change_date:      NaiveDate,
    prior_end_repeat: Option<NaiveDate>,
    continuation:     Option<Event>,
  },
  /// Remove the row together with its rule and cancellations.
  DeleteEvent { event_id: Uuid },
}

impl SeriesMutation {
  /// The existing row the mutation targets.
  pub fn target(&self) -> Uuid {
    match self {
      Self::Cancel { cancellation, .. } => cancellation.series_id,
      Self::UpdateInPlace { event, .. } => event.event_id,
      Self::Truncate { event_id, .. } | Self::DeleteEvent { event_id } => *event_id,
    }
  }

  /// The row the mutation creates, if any.
  pub fn created(&self) -> Option<&Event> {
    match self {
      Self::Cancel { detached, .. } => detached.as_ref(),
      Self::Truncate { continuation, .. } => continuation.as_ref(),
      Self::UpdateInPlace { .. } | Self::DeleteEvent { .. } => None,
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      Self::Cancel { .. } => "cancel",
      Self::UpdateInPlace { .. } => "update",
      Self::Truncate { .. } => "truncate",
      Self::DeleteEvent { .. } => "delete",
    }
  }
}

/// Plan an edit or deletion of `series` at `change_date`.
///
/// For a non-recurring event the scope is irrelevant: edits rewrite the row
/// and deletions remove it. For a series, `change_date` need not be a date
/// the rule actually generates; it must however lie within the series'
/// `[start_date, end_repeat]` range.
pub fn split_series(
  series: &Event,
  change_date: NaiveDate,
  scope: SplitScope,
  operation: SplitOperation,
) -> Result<SeriesMutation> {
  let bounds = series.bounds()?;

  if !series.repeats() {
    return match operation {
      SplitOperation::Edit(patch) => update_in_place(series, &patch),
      SplitOperation::Delete => Ok(SeriesMutation::DeleteEvent { event_id: series.event_id }),
    };
  }

  if change_date < bounds.start()
    || bounds.end_repeat().is_some_and(|until| change_date > until)
  {
    return Err(Error::ChangeDateOutOfRange {
      date:       change_date,
      start:      bounds.start(),
      end_repeat: bounds.end_repeat(),
    });
  }

  let cancellation = CanceledOccurrence { series_id: series.event_id, cancel_date: change_date };

  match (scope, operation) {
    (SplitScope::One, SplitOperation::Delete) => {
      Ok(SeriesMutation::Cancel { cancellation, detached: None })
    }
    (SplitScope::One, SplitOperation::Edit(patch)) => {
      let mut detached = moved_copy(series, change_date)?;
      detached.rule = None;
      detached.end_repeat = None;
      patch.apply_to_occurrence(&mut detached);
      detached.validate()?;
      Ok(SeriesMutation::Cancel { cancellation, detached: Some(detached) })
    }
    (SplitScope::Future, SplitOperation::Edit(patch)) if change_date == bounds.start() => {
      update_in_place(series, &patch)
    }
    (SplitScope::Future, SplitOperation::Delete) if change_date == bounds.start() => {
      Ok(SeriesMutation::DeleteEvent { event_id: series.event_id })
    }
    (SplitScope::Future, operation) => {
      // change_date > start, so the day before is still within the series.
      let end_repeat = change_date.pred_opt().ok_or_else(|| {
        Error::InvalidSeries(format!("no day precedes {change_date}"))
      })?;
      let continuation = match operation {
        SplitOperation::Delete => None,
        SplitOperation::Edit(patch) => {
          let mut continuation = moved_copy(series, change_date)?;
          patch.apply_to_series(&mut continuation);
          continuation.validate()?;
          Some(continuation)
        }
      };
      Ok(SeriesMutation::Truncate {
        event_id: series.event_id,
        end_repeat,
        change_date,
        prior_end_repeat: series.end_repeat,
        continuation,
      })
    }
  }
}

fn update_in_place(series: &Event, patch: &EventPatch) -> Result<SeriesMutation> {
  let mut event = series.clone();
  patch.apply_to_series(&mut event);
  event.validate()?;
  Ok(SeriesMutation::UpdateInPlace { event, prior_end_repeat: series.end_repeat })
}

/// A copy of `series` under a fresh id, starting on `date`.
fn moved_copy(series: &Event, date: NaiveDate) -> Result<Event> {
  let mut copy = series
    .at_occurrence(date)
    .ok_or_else(|| Error::InvalidSeries(format!("occurrence on {date} ends out of range")))?;
  copy.event_id = Uuid::new_v4();
  Ok(copy)
}
