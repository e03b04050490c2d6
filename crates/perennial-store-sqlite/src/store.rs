//! [`SqliteStore`]: the SQLite implementation of [`EventStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;
use tracing::{debug, info, warn};
use uuid::Uuid;

use perennial_core::{
  agenda::{self, EventInstance},
  event::{CanceledOccurrence, Event, NewEvent},
  split::SeriesMutation,
  store::EventStore,
  window::DateWindow,
};

use crate::{
  Error, Result,
  encode::{EncodedEvent, RawCancellation, RawEvent, encode_date, encode_event, encode_uuid},
  schema::SCHEMA,
};

/// Events left-joined with their rule; rule columns are NULL for single events.
const SELECT_EVENTS: &str = "
  SELECT
    e.event_id, e.title, e.location, e.start_date, e.end_date,
    e.start_time, e.end_time, e.end_repeat, e.members,
    r.freq, r.repeat_interval, r.by_weekday, r.by_month_day, r.by_month
  FROM events e
  LEFT JOIN event_rules r ON r.event_id = e.event_id";

/// Rows that can contribute to the window `?1..=?2`. Mirrors
/// `Event::is_candidate_for`.
const WINDOW_FILTER: &str = "
  e.start_date <= ?2
  AND (
    (r.event_id IS NULL AND e.end_date >= ?1)
    OR (r.event_id IS NOT NULL AND (e.end_repeat IS NULL OR e.end_repeat >= ?1))
  )";

fn raw_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEvent> {
  Ok(RawEvent {
    event_id:     row.get(0)?,
    title:        row.get(1)?,
    location:     row.get(2)?,
    start_date:   row.get(3)?,
    end_date:     row.get(4)?,
    start_time:   row.get(5)?,
    end_time:     row.get(6)?,
    end_repeat:   row.get(7)?,
    members:      row.get(8)?,
    freq:         row.get(9)?,
    interval:     row.get(10)?,
    by_weekday:   row.get(11)?,
    by_month_day: row.get(12)?,
    by_month:     row.get(13)?,
  })
}

fn raw_cancellation(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawCancellation> {
  Ok(RawCancellation { event_id: row.get(0)?, cancel_date: row.get(1)? })
}

fn select_window(
  conn: &rusqlite::Connection,
  from: &str,
  to: &str,
) -> rusqlite::Result<Vec<RawEvent>> {
  let sql = format!("{SELECT_EVENTS} WHERE {WINDOW_FILTER} ORDER BY e.start_date, e.event_id");
  let mut stmt = conn.prepare(&sql)?;
  stmt
    .query_map(rusqlite::params![from, to], raw_event)?
    .collect()
}

// ─── Writes ──────────────────────────────────────────────────────────────────

fn insert_event(conn: &rusqlite::Connection, e: &EncodedEvent) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO events (
       event_id, title, location, start_date, end_date,
       start_time, end_time, end_repeat, members
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    rusqlite::params![
      e.event_id,
      e.title,
      e.location,
      e.start_date,
      e.end_date,
      e.start_time,
      e.end_time,
      e.end_repeat,
      e.members,
    ],
  )?;
  insert_rule(conn, e)
}

fn insert_rule(conn: &rusqlite::Connection, e: &EncodedEvent) -> rusqlite::Result<()> {
  let Some(rule) = &e.rule else {
    return Ok(());
  };
  conn.execute(
    "INSERT INTO event_rules (
       event_id, freq, repeat_interval, by_weekday, by_month_day, by_month
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    rusqlite::params![
      e.event_id,
      rule.freq,
      rule.interval,
      rule.by_weekday,
      rule.by_month_day,
      rule.by_month,
    ],
  )?;
  Ok(())
}

fn row_exists(conn: &rusqlite::Connection, event_id: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row("SELECT 1 FROM events WHERE event_id = ?1", rusqlite::params![event_id], |_| {
        Ok(())
      })
      .optional()?
      .is_some(),
  )
}

/// How [`EncodedMutation::execute`] left the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
  Applied,
  /// The target row does not exist.
  Missing,
  /// The target row no longer matches the event the mutation was planned
  /// against.
  Stale,
  /// The occurrence to detach was already canceled.
  AlreadyCanceled,
}

/// A [`SeriesMutation`] with every value already encoded for SQLite.
enum EncodedMutation {
  Cancel {
    series_id:   String,
    cancel_date: String,
    detached:    Option<EncodedEvent>,
  },
  Update {
    event:            EncodedEvent,
    prior_end_repeat: Option<String>,
  },
  Truncate {
    event_id:         String,
    end_repeat:       String,
    change_date:      String,
    prior_end_repeat: Option<String>,
    continuation:     Option<EncodedEvent>,
  },
  Delete {
    event_id: String,
  },
}

impl EncodedMutation {
  fn encode(mutation: &SeriesMutation) -> Result<Self> {
    Ok(match mutation {
      SeriesMutation::Cancel { cancellation, detached } => Self::Cancel {
        series_id:   encode_uuid(cancellation.series_id),
        cancel_date: encode_date(cancellation.cancel_date),
        detached:    detached.as_ref().map(encode_event).transpose()?,
      },
      SeriesMutation::UpdateInPlace { event, prior_end_repeat } => Self::Update {
        event:            encode_event(event)?,
        prior_end_repeat: prior_end_repeat.map(encode_date),
      },
      SeriesMutation::Truncate {
        event_id,
        end_repeat,
        change_date,
        prior_end_repeat,
        continuation,
      } => Self::Truncate {
        event_id:         encode_uuid(*event_id),
        end_repeat:       encode_date(*end_repeat),
        change_date:      encode_date(*change_date),
        prior_end_repeat: prior_end_repeat.map(encode_date),
        continuation:     continuation.as_ref().map(encode_event).transpose()?,
      },
      SeriesMutation::DeleteEvent { event_id } => {
        Self::Delete { event_id: encode_uuid(*event_id) }
      }
    })
  }

  /// Run the writes on `conn`, which the caller holds inside a transaction.
  ///
  /// Anything but [`Outcome::Applied`] must roll the transaction back.
  fn execute(self, conn: &rusqlite::Connection) -> rusqlite::Result<Outcome> {
    match self {
      Self::Cancel { series_id, cancel_date, detached } => {
        if !row_exists(conn, &series_id)? {
          return Ok(Outcome::Missing);
        }

        let inserted = conn.execute(
          "INSERT OR IGNORE INTO canceled_occurrences (event_id, cancel_date) VALUES (?1, ?2)",
          rusqlite::params![series_id, cancel_date],
        )?;
        match &detached {
          // Canceling the same date twice is a no-op.
          None => {}
          Some(_) if inserted == 0 => return Ok(Outcome::AlreadyCanceled),
          Some(detached) => insert_event(conn, detached)?,
        }
        Ok(Outcome::Applied)
      }

      Self::Update { event, prior_end_repeat } => {
        let changed = conn.execute(
          "UPDATE events SET
             title = ?2, location = ?3, start_date = ?4, end_date = ?5,
             start_time = ?6, end_time = ?7, end_repeat = ?8, members = ?9
           WHERE event_id = ?1 AND end_repeat IS ?10",
          rusqlite::params![
            event.event_id,
            event.title,
            event.location,
            event.start_date,
            event.end_date,
            event.start_time,
            event.end_time,
            event.end_repeat,
            event.members,
            prior_end_repeat,
          ],
        )?;
        if changed == 0 {
          return stale_or_missing(conn, &event.event_id);
        }
        conn.execute(
          "DELETE FROM event_rules WHERE event_id = ?1",
          rusqlite::params![event.event_id],
        )?;
        insert_rule(conn, &event)?;
        Ok(Outcome::Applied)
      }

      Self::Truncate { event_id, end_repeat, change_date, prior_end_repeat, continuation } => {
        let changed = conn.execute(
          "UPDATE events SET end_repeat = ?2
           WHERE event_id = ?1 AND start_date < ?3 AND end_repeat IS ?4",
          rusqlite::params![event_id, end_repeat, change_date, prior_end_repeat],
        )?;
        if changed == 0 {
          return stale_or_missing(conn, &event_id);
        }

        // Cancellations from the change date on belong to the continuation,
        // or disappear with the occurrences they suppressed.
        match &continuation {
          Some(continuation) => {
            insert_event(conn, continuation)?;
            conn.execute(
              "UPDATE canceled_occurrences SET event_id = ?2
               WHERE event_id = ?1 AND cancel_date >= ?3",
              rusqlite::params![event_id, continuation.event_id, change_date],
            )?;
          }
          None => {
            conn.execute(
              "DELETE FROM canceled_occurrences WHERE event_id = ?1 AND cancel_date >= ?2",
              rusqlite::params![event_id, change_date],
            )?;
          }
        }
        Ok(Outcome::Applied)
      }

      Self::Delete { event_id } => {
        // Rule and cancellations go with it via ON DELETE CASCADE.
        let changed = conn.execute(
          "DELETE FROM events WHERE event_id = ?1",
          rusqlite::params![event_id],
        )?;
        Ok(if changed > 0 { Outcome::Applied } else { Outcome::Missing })
      }
    }
  }
}

fn stale_or_missing(conn: &rusqlite::Connection, event_id: &str) -> rusqlite::Result<Outcome> {
  Ok(if row_exists(conn, event_id)? { Outcome::Stale } else { Outcome::Missing })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Perennial event store backed by a single SQLite file.
///
/// Clones share one connection thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open a store in memory; nothing is persisted.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    debug!("schema initialised");
    Ok(())
  }
}

// ─── EventStore impl ─────────────────────────────────────────────────────────

impl EventStore for SqliteStore {
  type Error = Error;

  // ── Events ────────────────────────────────────────────────────────────────

  async fn create_event(&self, input: NewEvent) -> Result<Event> {
    let event = input.into_event(Uuid::new_v4());
    event.validate()?;
    let encoded = encode_event(&event)?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        insert_event(&tx, &encoded)?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    info!(event_id = %event.event_id, repeats = event.repeats(), "created event");
    Ok(event)
  }

  async fn get_event(&self, id: Uuid) -> Result<Option<Event>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawEvent> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("{SELECT_EVENTS} WHERE e.event_id = ?1"),
            rusqlite::params![id_str],
            raw_event,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawEvent::into_event).transpose()
  }

  async fn events_in_window(&self, window: DateWindow) -> Result<Vec<Event>> {
    let from = encode_date(window.start());
    let to = encode_date(window.end());

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| Ok(select_window(conn, &from, &to)?))
      .await?;

    debug!(start = %window.start(), end = %window.end(), rows = raws.len(), "loaded events");
    raws.into_iter().map(RawEvent::into_event).collect()
  }

  // ── Cancellations ─────────────────────────────────────────────────────────

  async fn cancellations(
    &self,
    series_id: Uuid,
    range: DateWindow,
  ) -> Result<Vec<CanceledOccurrence>> {
    let id_str = encode_uuid(series_id);
    let from = encode_date(range.start());
    let to = encode_date(range.end());

    let raws: Vec<RawCancellation> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT event_id, cancel_date FROM canceled_occurrences
           WHERE event_id = ?1 AND cancel_date BETWEEN ?2 AND ?3
           ORDER BY cancel_date",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str, from, to], raw_cancellation)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCancellation::into_cancellation).collect()
  }

  // ── Mutations ─────────────────────────────────────────────────────────────

  async fn apply_mutation(&self, mutation: SeriesMutation) -> Result<Option<Event>> {
    let target = mutation.target();
    let kind = mutation.kind();
    let change_date = match &mutation {
      SeriesMutation::Cancel { cancellation, .. } => Some(cancellation.cancel_date),
      SeriesMutation::Truncate { change_date, .. } => Some(*change_date),
      SeriesMutation::UpdateInPlace { .. } | SeriesMutation::DeleteEvent { .. } => None,
    };
    if let Some(created) = mutation.created() {
      created.validate()?;
    }
    let encoded = EncodedMutation::encode(&mutation)?;

    let outcome = self
      .conn
      .call(move |conn| {
        // Dropping the transaction without committing rolls it back.
        let tx = conn.transaction()?;
        let outcome = encoded.execute(&tx)?;
        if outcome == Outcome::Applied {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?;

    match outcome {
      Outcome::Applied => {}
      Outcome::Missing => return Err(Error::EventNotFound(target)),
      Outcome::Stale => {
        warn!(event_id = %target, kind, "series changed since mutation was planned");
        return Err(Error::SeriesChanged(target));
      }
      Outcome::AlreadyCanceled => {
        return Err(Error::OccurrenceAlreadyCanceled {
          event_id: target,
          date:     change_date.unwrap_or_default(),
        });
      }
    }

    let created = match mutation {
      SeriesMutation::Cancel { detached, .. } => detached,
      SeriesMutation::Truncate { continuation, .. } => continuation,
      SeriesMutation::UpdateInPlace { .. } | SeriesMutation::DeleteEvent { .. } => None,
    };
    info!(
      event_id = %target,
      kind,
      change_date = ?change_date,
      created = ?created.as_ref().map(|e| e.event_id),
      "applied mutation"
    );
    Ok(created)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn agenda(&self, window: DateWindow) -> Result<Vec<EventInstance>> {
    let from = encode_date(window.start());
    let to = encode_date(window.end());

    let (raw_events, raw_cancellations) = self
      .conn
      .call(move |conn| {
        // One read transaction so events and cancellations agree.
        let tx = conn.transaction()?;
        let events = select_window(&tx, &from, &to)?;

        // An occurrence starting up to its duration before the window still
        // overlaps it, so look back that far for its cancellation.
        let sql = format!(
          "SELECT c.event_id, c.cancel_date
           FROM canceled_occurrences c
           JOIN events e ON e.event_id = c.event_id
           LEFT JOIN event_rules r ON r.event_id = e.event_id
           WHERE {WINDOW_FILTER}
             AND c.cancel_date <= ?2
             AND julianday(c.cancel_date)
                 >= julianday(?1) - (julianday(e.end_date) - julianday(e.start_date))"
        );
        let cancellations = {
          let mut stmt = tx.prepare(&sql)?;
          stmt
            .query_map(rusqlite::params![from, to], raw_cancellation)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        tx.commit()?;
        Ok((events, cancellations))
      })
      .await?;

    let events = raw_events
      .into_iter()
      .map(RawEvent::into_event)
      .collect::<Result<Vec<_>>>()?;
    let cancellations = raw_cancellations
      .into_iter()
      .map(RawCancellation::into_cancellation)
      .collect::<Result<Vec<_>>>()?;

    debug!(
      start = %window.start(),
      end = %window.end(),
      events = events.len(),
      cancellations = cancellations.len(),
      "computing agenda"
    );
    Ok(agenda::agenda(&window, &events, &cancellations)?)
  }
}
