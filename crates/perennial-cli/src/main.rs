//! `perennial`: command-line front end for the Perennial event store.
//!
//! # Usage
//!
//! ```
//! perennial add --title Climbing --start 2025-03-15 --freq weekly --weekday 1,5
//! perennial agenda --from 2025-03-01 --to 2025-03-31
//! perennial edit <ID> --date 2025-04-01 --scope future --title Gym
//! perennial delete <ID> --date 2025-03-18 --scope one
//! ```
//!
//! The store location comes from `perennial.toml` (or `--config`) and the
//! `PERENNIAL_STORE_PATH` environment variable.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand, ValueEnum};
use perennial_core::{
  agenda::EventInstance,
  event::{Event, EventPatch, NewEvent},
  rule::{Frequency, RecurrenceRule, RuleSpec, parse_index_list},
  split::{SplitOperation, SplitScope, split_series},
  store::EventStore,
  window::DateWindow,
};
use perennial_store_sqlite::SqliteStore;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const DEFAULT_STORE_PATH: &str = "~/.local/share/perennial/perennial.db";

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "perennial", version, about = "Recurring calendar events")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, global = true, default_value = "perennial.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List every occurrence between two dates, in order.
  Agenda {
    #[arg(long)]
    from: NaiveDate,
    #[arg(long)]
    to:   NaiveDate,
    #[arg(long)]
    json: bool,
  },

  /// Create a single event, or a series when `--freq` is given.
  Add(AddArgs),

  /// Edit one occurrence of a series, or it and every later one.
  Edit {
    id:         Uuid,
    /// Start date of the occurrence being changed.
    #[arg(long)]
    date:       NaiveDate,
    #[arg(long, value_enum)]
    scope:      Scope,
    #[arg(long)]
    title:      Option<String>,
    #[arg(long)]
    location:   Option<String>,
    #[arg(long, value_parser = parse_time)]
    start_time: Option<NaiveTime>,
    #[arg(long, value_parser = parse_time)]
    end_time:   Option<NaiveTime>,
  },

  /// Delete one occurrence of a series, or it and every later one.
  Delete {
    id:    Uuid,
    #[arg(long)]
    date:  NaiveDate,
    #[arg(long, value_enum)]
    scope: Scope,
  },

  /// Print a stored event.
  Show {
    id:   Uuid,
    #[arg(long)]
    json: bool,
  },
}

#[derive(clap::Args, Debug)]
struct AddArgs {
  #[arg(long)]
  title:      String,
  #[arg(long)]
  start:      NaiveDate,
  /// Last day of the (first) occurrence; defaults to `--start`.
  #[arg(long)]
  end:        Option<NaiveDate>,
  #[arg(long, value_parser = parse_time)]
  start_time: Option<NaiveTime>,
  #[arg(long, value_parser = parse_time)]
  end_time:   Option<NaiveTime>,
  #[arg(long)]
  location:   Option<String>,
  /// Participant id; repeatable.
  #[arg(long = "member")]
  members:    Vec<Uuid>,

  /// daily, weekly, monthly or yearly, or the legacy codes 3, 2, 1, 0.
  #[arg(long)]
  freq:       Option<Frequency>,
  #[arg(long, default_value_t = 1)]
  interval:   u32,
  /// Comma-separated weekday indices, Monday = 0.
  #[arg(long)]
  weekday:    Option<String>,
  /// Comma-separated days of the month.
  #[arg(long)]
  month_day:  Option<String>,
  #[arg(long)]
  month:      Option<u32>,
  /// No occurrence begins after this date.
  #[arg(long)]
  until:      Option<NaiveDate>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Scope {
  One,
  Future,
}

impl From<Scope> for SplitScope {
  fn from(scope: Scope) -> Self {
    match scope {
      Scope::One => SplitScope::One,
      Scope::Future => SplitScope::Future,
    }
  }
}

fn parse_time(s: &str) -> Result<NaiveTime, chrono::ParseError> {
  NaiveTime::parse_from_str(s, "%H:%M").or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
}

// ─── Config ───────────────────────────────────────────────────────────────────

#[derive(Deserialize, Serialize, Debug, Clone)]
struct CliConfig {
  store_path: PathBuf,
}

fn load_config(path: &Path) -> anyhow::Result<CliConfig> {
  let settings = config::Config::builder()
    .set_default("store_path", DEFAULT_STORE_PATH)
    .context("failed to set config defaults")?
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("PERENNIAL"))
    .build()
    .context("failed to read config file")?;

  settings
    .try_deserialize()
    .context("failed to deserialise CliConfig")
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Logs go to stderr so `--json` output stays clean.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = load_config(&cli.config)?;
  let store_path = expand_tilde(&cfg.store_path);

  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  tracing::debug!(path = %store_path.display(), "opened store");

  match cli.command {
    Command::Agenda { from, to, json } => {
      let window = DateWindow::new(from, to)?;
      let instances = store.agenda(window).await.context("failed to compute agenda")?;
      if json {
        println!("{}", serde_json::to_string_pretty(&instances)?);
      } else {
        for instance in &instances {
          println!("{}", format_instance(instance));
        }
      }
    }

    Command::Add(args) => {
      let event = store
        .create_event(new_event(args)?)
        .await
        .context("failed to create event")?;
      println!("{}", event.event_id);
    }

    Command::Edit { id, date, scope, title, location, start_time, end_time } => {
      let patch = EventPatch {
        title,
        location: location.map(Some),
        start_time: start_time.map(Some),
        end_time: end_time.map(Some),
        ..EventPatch::default()
      };
      if patch.is_empty() {
        bail!("nothing to change: pass at least one of --title, --location, --start-time, --end-time");
      }
      if let Some(created) = change(&store, id, date, scope, SplitOperation::Edit(patch)).await? {
        println!("{}", created.event_id);
      }
    }

    Command::Delete { id, date, scope } => {
      change(&store, id, date, scope, SplitOperation::Delete).await?;
    }

    Command::Show { id, json } => {
      let event = store
        .get_event(id)
        .await
        .context("failed to load event")?
        .with_context(|| format!("no event with id {id}"))?;
      if json {
        println!("{}", serde_json::to_string_pretty(&event)?);
      } else {
        print_event(&event);
      }
    }
  }

  Ok(())
}

// ─── Commands ─────────────────────────────────────────────────────────────────

/// Plan a split of the stored event `id` at `date` and apply it.
async fn change(
  store: &SqliteStore,
  id: Uuid,
  date: NaiveDate,
  scope: Scope,
  operation: SplitOperation,
) -> anyhow::Result<Option<Event>> {
  let series = store
    .get_event(id)
    .await
    .context("failed to load event")?
    .with_context(|| format!("no event with id {id}"))?;

  let mutation = split_series(&series, date, scope.into(), operation)?;
  store
    .apply_mutation(mutation)
    .await
    .with_context(|| format!("failed to update event {id}"))
}

fn new_event(args: AddArgs) -> anyhow::Result<NewEvent> {
  let rule = match args.freq {
    Some(freq) => Some(build_rule(freq, &args)?),
    None => {
      if args.weekday.is_some() || args.month_day.is_some() || args.month.is_some() {
        bail!("--weekday, --month-day and --month need --freq");
      }
      if args.until.is_some() {
        bail!("--until needs --freq");
      }
      None
    }
  };

  let mut input = NewEvent::new(args.title, args.start);
  input.end_date = args.end.unwrap_or(args.start);
  input.start_time = args.start_time;
  input.end_time = args.end_time;
  input.location = args.location;
  input.members = args.members;
  input.end_repeat = args.until;
  input.rule = rule;
  Ok(input)
}

fn build_rule(freq: Frequency, args: &AddArgs) -> anyhow::Result<RecurrenceRule> {
  let byweekday = args
    .weekday
    .as_deref()
    .map(|list| -> anyhow::Result<Vec<u8>> {
      parse_index_list(list)?
        .into_iter()
        .map(|i| u8::try_from(i).with_context(|| format!("weekday index {i} is out of range")))
        .collect()
    })
    .transpose()?;
  let bymonthday = args.month_day.as_deref().map(parse_index_list).transpose()?;

  let spec = RuleSpec { freq, interval: args.interval, byweekday, bymonthday, bymonth: args.month };
  Ok(RecurrenceRule::try_from(spec)?)
}

// ─── Output ───────────────────────────────────────────────────────────────────

fn format_time(time: Option<NaiveTime>) -> String {
  time.map_or_else(|| "--:--".to_owned(), |t| t.format("%H:%M").to_string())
}

fn format_instance(instance: &EventInstance) -> String {
  let event = &instance.event;
  let mut line = format!(
    "{}  {}  {}",
    event.start_date,
    format_time(event.start_time),
    event.title
  );
  if event.end_date != event.start_date {
    line.push_str(&format!(" (until {})", event.end_date));
  }
  if let Some(location) = &event.location {
    line.push_str(&format!(" @ {location}"));
  }
  line.push_str(&format!("  [{}]", instance.series_id.unwrap_or(event.event_id)));
  line
}

fn print_event(event: &Event) {
  println!("id:       {}", event.event_id);
  println!("title:    {}", event.title);
  if let Some(location) = &event.location {
    println!("location: {location}");
  }
  println!("dates:    {} .. {}", event.start_date, event.end_date);
  if event.start_time.is_some() || event.end_time.is_some() {
    println!(
      "time:     {} .. {}",
      format_time(event.start_time),
      format_time(event.end_time)
    );
  }
  if let Some(rule) = &event.rule {
    let spec = RuleSpec::from(rule.clone());
    let mut line = format!("every {} x {}", spec.interval, spec.freq);
    if let Some(days) = &spec.byweekday {
      line.push_str(&format!(" weekdays {days:?}"));
    }
    if let Some(month) = spec.bymonth {
      line.push_str(&format!(" month {month}"));
    }
    if let Some(days) = &spec.bymonthday {
      line.push_str(&format!(" days {days:?}"));
    }
    println!("repeats:  {line}");
    match event.end_repeat {
      Some(until) => println!("until:    {until}"),
      None => println!("until:    forever"),
    }
  }
  if !event.members.is_empty() {
    println!("members:  {}", event.members.len());
  }
}
