//! SQL schema for the Perennial SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision for future migrations.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per single event or per series. A series row's own dates are its
-- first occurrence; later occurrences are computed, never stored.
CREATE TABLE IF NOT EXISTS events (
    event_id    TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    location    TEXT,
    start_date  TEXT NOT NULL,   -- YYYY-MM-DD
    end_date    TEXT NOT NULL,   -- YYYY-MM-DD, inclusive
    start_time  TEXT,            -- HH:MM:SS or NULL
    end_time    TEXT,            -- HH:MM:SS or NULL
    end_repeat  TEXT,            -- last date an occurrence may begin on
    members     TEXT NOT NULL DEFAULT '[]',
    CHECK (end_date >= start_date),
    CHECK (end_repeat IS NULL OR end_repeat >= start_date)
);

-- Present only for series.
CREATE TABLE IF NOT EXISTS event_rules (
    event_id        TEXT PRIMARY KEY REFERENCES events(event_id) ON DELETE CASCADE,
    freq            INTEGER NOT NULL CHECK (freq BETWEEN 0 AND 3),  -- 0 yearly, 1 monthly, 2 weekly, 3 daily
    repeat_interval INTEGER NOT NULL CHECK (repeat_interval >= 1),
    by_weekday      TEXT,            -- JSON array, Monday = 0
    by_month_day    TEXT,            -- JSON array
    by_month        INTEGER
);

-- Suppressed occurrences, keyed by the occurrence's start date.
CREATE TABLE IF NOT EXISTS canceled_occurrences (
    event_id    TEXT NOT NULL REFERENCES events(event_id) ON DELETE CASCADE,
    cancel_date TEXT NOT NULL,
    PRIMARY KEY (event_id, cancel_date)
);

CREATE INDEX IF NOT EXISTS events_start_idx      ON events(start_date);
CREATE INDEX IF NOT EXISTS events_end_repeat_idx ON events(end_repeat);

PRAGMA user_version = 1;
";
