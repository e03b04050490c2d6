//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Dates are stored as `YYYY-MM-DD` (so they compare correctly as text),
//! times as `HH:MM:SS`, UUIDs as hyphenated lowercase strings, and list
//! values (members, rule qualifiers) as compact JSON.

use chrono::{NaiveDate, NaiveTime};
use perennial_core::{
  event::{CanceledOccurrence, Event},
  rule::{Frequency, RecurrenceRule, RuleSpec},
};
use uuid::Uuid;

use crate::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── NaiveDate / NaiveTime ───────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_time(t: NaiveTime) -> String { t.format(TIME_FORMAT).to_string() }

pub fn decode_time(s: &str) -> Result<NaiveTime> {
  NaiveTime::parse_from_str(s, TIME_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Members ─────────────────────────────────────────────────────────────────

pub fn encode_members(members: &[Uuid]) -> Result<String> {
  Ok(serde_json::to_string(members)?)
}

pub fn decode_members(s: &str) -> Result<Vec<Uuid>> { Ok(serde_json::from_str(s)?) }

// ─── RecurrenceRule ──────────────────────────────────────────────────────────

/// Column values of an `event_rules` row.
pub struct EncodedRule {
  pub freq:         i64,
  pub interval:     i64,
  pub by_weekday:   Option<String>,
  pub by_month_day: Option<String>,
  pub by_month:     Option<i64>,
}

pub fn encode_rule(rule: &RecurrenceRule) -> Result<EncodedRule> {
  let spec = RuleSpec::from(rule.clone());
  Ok(EncodedRule {
    freq:         i64::from(spec.freq.code()),
    interval:     i64::from(spec.interval),
    by_weekday:   spec.byweekday.as_deref().map(serde_json::to_string).transpose()?,
    by_month_day: spec.bymonthday.as_deref().map(serde_json::to_string).transpose()?,
    by_month:     spec.bymonth.map(i64::from),
  })
}

fn decode_rule(raw: EncodedRule) -> Result<RecurrenceRule> {
  let freq = u8::try_from(raw.freq).map_err(|_| {
    perennial_core::Error::InvalidRule(format!("stored frequency {} out of range", raw.freq))
  })?;
  let interval = u32::try_from(raw.interval).map_err(|_| {
    perennial_core::Error::InvalidRule(format!("stored interval {} out of range", raw.interval))
  })?;
  let bymonth = raw
    .by_month
    .map(|m| {
      u32::try_from(m).map_err(|_| {
        perennial_core::Error::InvalidRule(format!("stored month {m} out of range"))
      })
    })
    .transpose()?;

  let spec = RuleSpec {
    freq: Frequency::from_code(freq)?,
    interval,
    byweekday: raw.by_weekday.as_deref().map(serde_json::from_str).transpose()?,
    bymonthday: raw.by_month_day.as_deref().map(serde_json::from_str).transpose()?,
    bymonth,
  };
  Ok(RecurrenceRule::try_from(spec)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Every column of an `events` row, already encoded, plus its rule row.
/// Built outside the database thread so closures only move plain strings.
pub struct EncodedEvent {
  pub event_id:   String,
  pub title:      String,
  pub location:   Option<String>,
  pub start_date: String,
  pub end_date:   String,
  pub start_time: Option<String>,
  pub end_time:   Option<String>,
  pub end_repeat: Option<String>,
  pub members:    String,
  pub rule:       Option<EncodedRule>,
}

pub fn encode_event(event: &Event) -> Result<EncodedEvent> {
  Ok(EncodedEvent {
    event_id:   encode_uuid(event.event_id),
    title:      event.title.clone(),
    location:   event.location.clone(),
    start_date: encode_date(event.start_date),
    end_date:   encode_date(event.end_date),
    start_time: event.start_time.map(encode_time),
    end_time:   event.end_time.map(encode_time),
    end_repeat: event.end_repeat.map(encode_date),
    members:    encode_members(&event.members)?,
    rule:       event.rule.as_ref().map(encode_rule).transpose()?,
  })
}

/// Raw strings read from an `events` row left-joined with `event_rules`.
pub struct RawEvent {
  // events columns
  pub event_id:     String,
  pub title:        String,
  pub location:     Option<String>,
  pub start_date:   String,
  pub end_date:     String,
  pub start_time:   Option<String>,
  pub end_time:     Option<String>,
  pub end_repeat:   Option<String>,
  pub members:      String,
  // event_rules join
  pub freq:         Option<i64>,
  pub interval:     Option<i64>,
  pub by_weekday:   Option<String>,
  pub by_month_day: Option<String>,
  pub by_month:     Option<i64>,
}

impl RawEvent {
  pub fn into_event(self) -> Result<Event> {
    let rule = match (self.freq, self.interval) {
      (Some(freq), Some(interval)) => Some(decode_rule(EncodedRule {
        freq,
        interval,
        by_weekday: self.by_weekday,
        by_month_day: self.by_month_day,
        by_month: self.by_month,
      })?),
      _ => None,
    };

    Ok(Event {
      event_id: decode_uuid(&self.event_id)?,
      title: self.title,
      location: self.location,
      start_date: decode_date(&self.start_date)?,
      end_date: decode_date(&self.end_date)?,
      start_time: self.start_time.as_deref().map(decode_time).transpose()?,
      end_time: self.end_time.as_deref().map(decode_time).transpose()?,
      end_repeat: self.end_repeat.as_deref().map(decode_date).transpose()?,
      rule,
      members: decode_members(&self.members)?,
    })
  }
}

/// Raw strings read from a `canceled_occurrences` row.
pub struct RawCancellation {
  pub event_id:    String,
  pub cancel_date: String,
}

impl RawCancellation {
  pub fn into_cancellation(self) -> Result<CanceledOccurrence> {
    Ok(CanceledOccurrence {
      series_id:   decode_uuid(&self.event_id)?,
      cancel_date: decode_date(&self.cancel_date)?,
    })
  }
}
