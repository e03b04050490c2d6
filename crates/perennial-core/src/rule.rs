//! Recurrence rules: how a series repeats.
//!
//! A [`RecurrenceRule`] is a closed tagged variant: each [`Pattern`] carries
//! only the qualifiers that are meaningful for its frequency, so a weekly rule
//! with a month number (or a monthly rule without days) cannot be built.
//! Validation happens once, at construction; the engine never re-checks.

use std::{fmt, str::FromStr};

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Largest accepted step between periods.
pub const MAX_INTERVAL: u32 = 1000;

// ─── Frequency ───────────────────────────────────────────────────────────────

/// The unit a rule steps in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
  Yearly,
  Monthly,
  Weekly,
  Daily,
}

impl Frequency {
  /// Integer code of the legacy planner API: `0` yearly, `1` monthly,
  /// `2` weekly, `3` daily.
  pub fn code(self) -> u8 {
    match self {
      Self::Yearly => 0,
      Self::Monthly => 1,
      Self::Weekly => 2,
      Self::Daily => 3,
    }
  }

  pub fn from_code(code: u8) -> Result<Self> {
    match code {
      0 => Ok(Self::Yearly),
      1 => Ok(Self::Monthly),
      2 => Ok(Self::Weekly),
      3 => Ok(Self::Daily),
      other => Err(Error::InvalidRule(format!("unknown frequency code {other}"))),
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Yearly => "yearly",
      Self::Monthly => "monthly",
      Self::Weekly => "weekly",
      Self::Daily => "daily",
    }
  }
}

impl fmt::Display for Frequency {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Frequency {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "yearly" => Ok(Self::Yearly),
      "monthly" => Ok(Self::Monthly),
      "weekly" => Ok(Self::Weekly),
      "daily" => Ok(Self::Daily),
      other => match other.parse::<u8>() {
        Ok(code) => Self::from_code(code),
        Err(_) => Err(Error::InvalidRule(format!("unknown frequency {other:?}"))),
      },
    }
  }
}

// ─── Pattern ─────────────────────────────────────────────────────────────────

/// Per-frequency qualifiers. Sets are sorted ascending and deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
  Daily,
  Weekly { weekdays: Vec<Weekday> },
  Monthly { month_days: Vec<u32> },
  Yearly { month: u32, month_days: Vec<u32> },
}

// ─── RecurrenceRule ──────────────────────────────────────────────────────────

/// An immutable, validated description of how an event repeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RuleSpec", into = "RuleSpec")]
pub struct RecurrenceRule {
  interval: u32,
  pattern:  Pattern,
}

impl RecurrenceRule {
  pub fn daily(interval: u32) -> Result<Self> {
    check_interval(interval)?;
    Ok(Self { interval, pattern: Pattern::Daily })
  }

  /// Every `interval` weeks on each of `weekdays`.
  pub fn weekly(
    interval: u32,
    weekdays: impl IntoIterator<Item = Weekday>,
  ) -> Result<Self> {
    check_interval(interval)?;
    let mut weekdays: Vec<Weekday> = weekdays.into_iter().collect();
    weekdays.sort_by_key(Weekday::num_days_from_monday);
    weekdays.dedup();
    if weekdays.is_empty() {
      return Err(Error::InvalidRule("weekly rule needs at least one weekday".into()));
    }
    Ok(Self { interval, pattern: Pattern::Weekly { weekdays } })
  }

  /// Every `interval` months on each of `month_days`.
  pub fn monthly(
    interval: u32,
    month_days: impl IntoIterator<Item = u32>,
  ) -> Result<Self> {
    check_interval(interval)?;
    let month_days = normalize_month_days(month_days)?;
    Ok(Self { interval, pattern: Pattern::Monthly { month_days } })
  }

  /// Every `interval` years in `month`, on each of `month_days`.
  pub fn yearly(
    interval: u32,
    month: u32,
    month_days: impl IntoIterator<Item = u32>,
  ) -> Result<Self> {
    check_interval(interval)?;
    if !(1..=12).contains(&month) {
      return Err(Error::InvalidRule(format!("month {month} is not in 1..=12")));
    }
    let month_days = normalize_month_days(month_days)?;
    Ok(Self { interval, pattern: Pattern::Yearly { month, month_days } })
  }

  pub fn interval(&self) -> u32 { self.interval }

  pub fn pattern(&self) -> &Pattern { &self.pattern }

  pub fn frequency(&self) -> Frequency {
    match self.pattern {
      Pattern::Daily => Frequency::Daily,
      Pattern::Weekly { .. } => Frequency::Weekly,
      Pattern::Monthly { .. } => Frequency::Monthly,
      Pattern::Yearly { .. } => Frequency::Yearly,
    }
  }
}

fn check_interval(interval: u32) -> Result<()> {
  if interval == 0 || interval > MAX_INTERVAL {
    return Err(Error::InvalidRule(format!(
      "interval {interval} is not in 1..={MAX_INTERVAL}"
    )));
  }
  Ok(())
}

fn normalize_month_days(days: impl IntoIterator<Item = u32>) -> Result<Vec<u32>> {
  let mut days: Vec<u32> = days.into_iter().collect();
  if let Some(bad) = days.iter().find(|d| !(1..=31).contains(*d)) {
    return Err(Error::InvalidRule(format!("day of month {bad} is not in 1..=31")));
  }
  days.sort_unstable();
  days.dedup();
  if days.is_empty() {
    return Err(Error::InvalidRule("rule needs at least one day of month".into()));
  }
  Ok(days)
}

/// Monday = 0 … Sunday = 6.
pub fn weekday_from_index(index: u8) -> Option<Weekday> {
  match index {
    0 => Some(Weekday::Mon),
    1 => Some(Weekday::Tue),
    2 => Some(Weekday::Wed),
    3 => Some(Weekday::Thu),
    4 => Some(Weekday::Fri),
    5 => Some(Weekday::Sat),
    6 => Some(Weekday::Sun),
    _ => None,
  }
}

// ─── Wire form ───────────────────────────────────────────────────────────────

/// The flat form a rule is exchanged in: one frequency plus optional
/// qualifier lists. Converting to [`RecurrenceRule`] rejects any qualifier
/// that does not belong to `freq`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
  pub freq:       Frequency,
  #[serde(default = "default_interval")]
  pub interval:   u32,
  /// Weekday indices, Monday = 0.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub byweekday:  Option<Vec<u8>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bymonthday: Option<Vec<u32>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bymonth:    Option<u32>,
}

fn default_interval() -> u32 { 1 }

impl TryFrom<RuleSpec> for RecurrenceRule {
  type Error = Error;

  fn try_from(spec: RuleSpec) -> Result<Self> {
    let has_weekdays = spec.byweekday.as_ref().is_some_and(|w| !w.is_empty());
    let has_month_days = spec.bymonthday.as_ref().is_some_and(|d| !d.is_empty());
    let has_month = spec.bymonth.is_some();

    let stray = match spec.freq {
      Frequency::Daily => has_weekdays || has_month_days || has_month,
      Frequency::Weekly => has_month_days || has_month,
      Frequency::Monthly => has_weekdays || has_month,
      Frequency::Yearly => has_weekdays,
    };
    if stray {
      return Err(Error::InvalidRule(format!(
        "qualifier not allowed for a {} rule",
        spec.freq
      )));
    }

    match spec.freq {
      Frequency::Daily => Self::daily(spec.interval),
      Frequency::Weekly => {
        let weekdays = spec
          .byweekday
          .unwrap_or_default()
          .into_iter()
          .map(|i| {
            weekday_from_index(i)
              .ok_or_else(|| Error::InvalidRule(format!("weekday index {i} is not in 0..=6")))
          })
          .collect::<Result<Vec<_>>>()?;
        Self::weekly(spec.interval, weekdays)
      }
      Frequency::Monthly => {
        Self::monthly(spec.interval, spec.bymonthday.unwrap_or_default())
      }
      Frequency::Yearly => {
        let month = spec
          .bymonth
          .ok_or_else(|| Error::InvalidRule("yearly rule needs a month".into()))?;
        Self::yearly(spec.interval, month, spec.bymonthday.unwrap_or_default())
      }
    }
  }
}

impl From<RecurrenceRule> for RuleSpec {
  fn from(rule: RecurrenceRule) -> Self {
    let freq = rule.frequency();
    let interval = rule.interval;
    let (byweekday, bymonthday, bymonth) = match rule.pattern {
      Pattern::Daily => (None, None, None),
      Pattern::Weekly { weekdays } => (
        Some(
          weekdays
            .iter()
            .map(|w| w.num_days_from_monday() as u8)
            .collect(),
        ),
        None,
        None,
      ),
      Pattern::Monthly { month_days } => (None, Some(month_days), None),
      Pattern::Yearly { month, month_days } => (None, Some(month_days), Some(month)),
    };
    Self { freq, interval, byweekday, bymonthday, bymonth }
  }
}

/// Parse a comma-separated list of integers such as `"1, 28"`, the form the
/// planner historically stored qualifier sets in. An empty string is an
/// empty list.
pub fn parse_index_list(s: &str) -> Result<Vec<u32>> {
  s.split(',')
    .map(str::trim)
    .filter(|part| !part.is_empty())
    .map(|part| {
      part
        .parse::<u32>()
        .map_err(|_| Error::InvalidRule(format!("{part:?} is not a number")))
    })
    .collect()
}
