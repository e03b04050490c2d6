//! The `EventStore` trait: what the engine needs from persistence.
//!
//! The trait is implemented by storage backends (e.g.
//! `perennial-store-sqlite`). The engine itself never calls it; callers load
//! rows through it, run the pure pipeline, and hand planned
//! [`SeriesMutation`]s back to it.

use std::future::Future;

use uuid::Uuid;

use crate::{
  agenda::EventInstance,
  event::{CanceledOccurrence, Event, NewEvent},
  split::SeriesMutation,
  window::DateWindow,
};

/// Abstraction over an event store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait EventStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Events ────────────────────────────────────────────────────────────

  /// Validate and persist a new event (single or series).
  fn create_event(
    &self,
    input: NewEvent,
  ) -> impl Future<Output = Result<Event, Self::Error>> + Send + '_;

  /// Retrieve an event by id. Returns `None` if not found.
  fn get_event(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Event>, Self::Error>> + Send + '_;

  /// Every event that can contribute to `window`: single events overlapping
  /// it, and series that start by its end and have not stopped repeating
  /// before its start.
  fn events_in_window(
    &self,
    window: DateWindow,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + '_;

  // ── Cancellations ─────────────────────────────────────────────────────

  /// Cancellations recorded for `series_id` with a date inside `range`,
  /// ordered by date.
  fn cancellations(
    &self,
    series_id: Uuid,
    range: DateWindow,
  ) -> impl Future<Output = Result<Vec<CanceledOccurrence>, Self::Error>> + Send + '_;

  // ── Mutations ─────────────────────────────────────────────────────────

  /// Apply a planned mutation atomically. Returns the event the mutation
  /// created (a detached occurrence or a continuation series), if any.
  ///
  /// Either every write of the mutation is committed or none is.
  fn apply_mutation(
    &self,
    mutation: SeriesMutation,
  ) -> impl Future<Output = Result<Option<Event>, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The ordered agenda for `window`, computed from one consistent
  /// snapshot of events and cancellations.
  fn agenda(
    &self,
    window: DateWindow,
  ) -> impl Future<Output = Result<Vec<EventInstance>, Self::Error>> + Send + '_;
}
