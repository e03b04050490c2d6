//! Error type for `perennial-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] perennial_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A mutation targeted an event that does not exist; nothing was written.
  #[error("event not found: {0}")]
  EventNotFound(uuid::Uuid),

  /// The event was modified after the mutation was planned from it;
  /// nothing was written.
  #[error("event {0} changed since the edit was planned")]
  SeriesChanged(uuid::Uuid),

  /// The occurrence was already canceled or detached; nothing was written.
  #[error("occurrence of {event_id} on {date} is already canceled")]
  OccurrenceAlreadyCanceled {
    event_id: uuid::Uuid,
    date:     chrono::NaiveDate,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
