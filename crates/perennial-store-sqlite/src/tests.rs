//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{NaiveDate, NaiveTime, Weekday};
use perennial_core::{
  event::{Event, EventPatch, NewEvent},
  rule::RecurrenceRule,
  split::{SeriesMutation, SplitOperation, SplitScope, split_series},
  store::EventStore,
  window::DateWindow,
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, day).unwrap() }

fn window(from: NaiveDate, to: NaiveDate) -> DateWindow { DateWindow::new(from, to).unwrap() }

/// Weekly on Tuesday and Saturday from Saturday 2025-03-15, 18:00.
fn climbing() -> NewEvent {
  let mut input = NewEvent::new("Climbing", d(2025, 3, 15));
  input.start_time = NaiveTime::from_hms_opt(18, 0, 0);
  input.location = Some("Boulder Hall".into());
  input.members = vec![Uuid::new_v4(), Uuid::new_v4()];
  input.rule = Some(RecurrenceRule::weekly(1, [Weekday::Tue, Weekday::Sat]).unwrap());
  input
}

fn retitle(title: &str) -> SplitOperation {
  SplitOperation::Edit(EventPatch { title: Some(title.into()), ..EventPatch::default() })
}

async fn agenda_dates(s: &SqliteStore, from: NaiveDate, to: NaiveDate) -> Vec<(NaiveDate, String)> {
  s.agenda(window(from, to))
    .await
    .unwrap()
    .into_iter()
    .map(|i| (i.event.start_date, i.event.title))
    .collect()
}

async fn plan_and_apply(
  s: &SqliteStore,
  series: &Event,
  date: NaiveDate,
  scope: SplitScope,
  op: SplitOperation,
) -> Option<Event> {
  let mutation = split_series(series, date, scope, op).unwrap();
  s.apply_mutation(mutation).await.unwrap()
}

// ─── Events ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_series() {
  let s = store().await;
  let created = s.create_event(climbing()).await.unwrap();

  let fetched = s.get_event(created.event_id).await.unwrap().unwrap();
  assert_eq!(fetched, created);
  assert!(fetched.repeats());
  assert_eq!(fetched.members.len(), 2);
}

#[tokio::test]
async fn get_event_missing_returns_none() {
  let s = store().await;
  assert!(s.get_event(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn create_rejects_inverted_dates() {
  let s = store().await;
  let mut input = NewEvent::new("Backwards", d(2025, 3, 10));
  input.end_date = d(2025, 3, 9);
  let err = s.create_event(input).await.unwrap_err();
  assert!(matches!(err, Error::Core(_)));
}

#[tokio::test]
async fn events_in_window_selects_candidates() {
  let s = store().await;
  let series = s.create_event(climbing()).await.unwrap();

  let mut ended = climbing();
  ended.start_date = d(2025, 1, 4);
  ended.end_date = d(2025, 1, 4);
  ended.end_repeat = Some(d(2025, 2, 28));
  s.create_event(ended).await.unwrap();

  let inside = s.create_event(NewEvent::new("Dentist", d(2025, 4, 2))).await.unwrap();
  s.create_event(NewEvent::new("Later", d(2025, 6, 1))).await.unwrap();

  let got = s.events_in_window(window(d(2025, 4, 1), d(2025, 4, 30))).await.unwrap();
  let ids: Vec<_> = got.iter().map(|e| e.event_id).collect();
  assert_eq!(ids, vec![series.event_id, inside.event_id]);
}

// ─── Agenda ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn agenda_expands_and_orders() {
  let s = store().await;
  s.create_event(climbing()).await.unwrap();
  s.create_event(NewEvent::new("Holiday", d(2025, 3, 18))).await.unwrap();

  let got = agenda_dates(&s, d(2025, 3, 17), d(2025, 3, 23)).await;
  assert_eq!(got, vec![
    (d(2025, 3, 18), "Holiday".to_owned()),
    (d(2025, 3, 18), "Climbing".to_owned()),
    (d(2025, 3, 22), "Climbing".to_owned()),
  ]);
}

#[tokio::test]
async fn agenda_sees_cancellation_of_spanning_occurrence() {
  let s = store().await;
  let mut input = NewEvent::new("Trip", d(2025, 3, 1));
  input.end_date = d(2025, 3, 3);
  input.rule = Some(RecurrenceRule::daily(7).unwrap());
  let series = s.create_event(input).await.unwrap();

  // The 2025-03-08 occurrence runs until the 10th and overlaps the window.
  let w = window(d(2025, 3, 9), d(2025, 3, 14));
  assert_eq!(agenda_dates(&s, w.start(), w.end()).await.len(), 1);

  plan_and_apply(&s, &series, d(2025, 3, 8), SplitScope::One, SplitOperation::Delete).await;
  assert!(agenda_dates(&s, w.start(), w.end()).await.is_empty());
}

// ─── Splits ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_one_is_idempotent() {
  let s = store().await;
  let series = s.create_event(climbing()).await.unwrap();

  for _ in 0..2 {
    let created =
      plan_and_apply(&s, &series, d(2025, 3, 18), SplitScope::One, SplitOperation::Delete).await;
    assert!(created.is_none());
  }

  let canceled = s
    .cancellations(series.event_id, window(d(2025, 3, 1), d(2025, 3, 31)))
    .await
    .unwrap();
  assert_eq!(canceled.len(), 1);
  assert_eq!(canceled[0].cancel_date, d(2025, 3, 18));

  let got = agenda_dates(&s, d(2025, 3, 17), d(2025, 3, 23)).await;
  assert_eq!(got, vec![(d(2025, 3, 22), "Climbing".to_owned())]);
}

#[tokio::test]
async fn edit_one_detaches_occurrence() {
  let s = store().await;
  let series = s.create_event(climbing()).await.unwrap();

  let detached =
    plan_and_apply(&s, &series, d(2025, 3, 22), SplitScope::One, retitle("Bouldering"))
      .await
      .unwrap();
  assert!(!detached.repeats());
  assert_eq!(s.get_event(detached.event_id).await.unwrap(), Some(detached.clone()));

  let got = s.agenda(window(d(2025, 3, 17), d(2025, 3, 23))).await.unwrap();
  let titles: Vec<_> = got.iter().map(|i| (i.event.start_date, i.series_id)).collect();
  assert_eq!(titles, vec![
    (d(2025, 3, 18), Some(series.event_id)),
    (d(2025, 3, 22), None),
  ]);
  assert_eq!(got[1].event.title, "Bouldering");
}

#[tokio::test]
async fn edit_future_partitions_the_series() {
  let s = store().await;
  let series = s.create_event(climbing()).await.unwrap();

  // Cancellations on both sides of the split.
  plan_and_apply(&s, &series, d(2025, 3, 18), SplitScope::One, SplitOperation::Delete).await;
  plan_and_apply(&s, &series, d(2025, 4, 5), SplitScope::One, SplitOperation::Delete).await;

  let continuation =
    plan_and_apply(&s, &series, d(2025, 4, 1), SplitScope::Future, retitle("Gym"))
      .await
      .unwrap();

  let truncated = s.get_event(series.event_id).await.unwrap().unwrap();
  assert_eq!(truncated.end_repeat, Some(d(2025, 3, 31)));
  assert_eq!(continuation.start_date, d(2025, 4, 1));

  let got = agenda_dates(&s, d(2025, 3, 15), d(2025, 4, 8)).await;
  assert_eq!(got, vec![
    (d(2025, 3, 15), "Climbing".to_owned()),
    (d(2025, 3, 22), "Climbing".to_owned()),
    (d(2025, 3, 25), "Climbing".to_owned()),
    (d(2025, 3, 29), "Climbing".to_owned()),
    (d(2025, 4, 1), "Gym".to_owned()),
    (d(2025, 4, 8), "Gym".to_owned()),
  ]);

  let all = window(d(2025, 1, 1), d(2025, 12, 31));
  let moved = s.cancellations(continuation.event_id, all).await.unwrap();
  assert_eq!(moved.len(), 1);
  assert_eq!(moved[0].cancel_date, d(2025, 4, 5));
  let kept = s.cancellations(series.event_id, all).await.unwrap();
  assert_eq!(kept.len(), 1);
  assert_eq!(kept[0].cancel_date, d(2025, 3, 18));
}

#[tokio::test]
async fn delete_future_drops_later_cancellations() {
  let s = store().await;
  let series = s.create_event(climbing()).await.unwrap();
  plan_and_apply(&s, &series, d(2025, 4, 5), SplitScope::One, SplitOperation::Delete).await;

  let created =
    plan_and_apply(&s, &series, d(2025, 4, 1), SplitScope::Future, SplitOperation::Delete).await;
  assert!(created.is_none());

  let all = window(d(2025, 1, 1), d(2025, 12, 31));
  assert!(s.cancellations(series.event_id, all).await.unwrap().is_empty());
  assert!(agenda_dates(&s, d(2025, 4, 1), d(2025, 4, 30)).await.is_empty());
}

#[tokio::test]
async fn delete_future_from_first_occurrence_removes_series() {
  let s = store().await;
  let series = s.create_event(climbing()).await.unwrap();
  plan_and_apply(&s, &series, d(2025, 3, 18), SplitScope::One, SplitOperation::Delete).await;

  plan_and_apply(&s, &series, series.start_date, SplitScope::Future, SplitOperation::Delete)
    .await;

  assert!(s.get_event(series.event_id).await.unwrap().is_none());
  let all = window(d(2025, 1, 1), d(2025, 12, 31));
  assert!(s.cancellations(series.event_id, all).await.unwrap().is_empty());
}

#[tokio::test]
async fn edit_future_from_first_occurrence_updates_rule() {
  let s = store().await;
  let series = s.create_event(climbing()).await.unwrap();
  let op = SplitOperation::Edit(EventPatch {
    rule: Some(RecurrenceRule::daily(2).unwrap()),
    ..EventPatch::default()
  });
  let created = plan_and_apply(&s, &series, series.start_date, SplitScope::Future, op).await;
  assert!(created.is_none());

  let fetched = s.get_event(series.event_id).await.unwrap().unwrap();
  assert_eq!(fetched.rule, Some(RecurrenceRule::daily(2).unwrap()));
  let got = agenda_dates(&s, d(2025, 3, 15), d(2025, 3, 19)).await;
  let dates: Vec<_> = got.into_iter().map(|(date, _)| date).collect();
  assert_eq!(dates, vec![d(2025, 3, 15), d(2025, 3, 17), d(2025, 3, 19)]);
}

// ─── Failures ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn mutation_on_missing_event_fails() {
  let s = store().await;
  let ghost = NewEvent::new("Ghost", d(2025, 3, 1)).into_event(Uuid::new_v4());
  let mutation =
    split_series(&ghost, d(2025, 3, 1), SplitScope::One, SplitOperation::Delete).unwrap();

  let err = s.apply_mutation(mutation).await.unwrap_err();
  assert!(matches!(err, Error::EventNotFound(id) if id == ghost.event_id));
}

#[tokio::test]
async fn failed_mutation_rolls_back() {
  let s = store().await;
  let series = s.create_event(climbing()).await.unwrap();
  let other = s.create_event(NewEvent::new("Dentist", d(2025, 4, 2))).await.unwrap();

  // A continuation that collides with an existing row fails on insert,
  // after the truncation has already been written inside the transaction.
  let mut continuation = series.at_occurrence(d(2025, 4, 1)).unwrap();
  continuation.event_id = other.event_id;
  let mutation = SeriesMutation::Truncate {
    event_id:         series.event_id,
    end_repeat:       d(2025, 3, 31),
    change_date:      d(2025, 4, 1),
    prior_end_repeat: None,
    continuation:     Some(continuation),
  };

  let err = s.apply_mutation(mutation).await.unwrap_err();
  assert!(matches!(err, Error::Database(_)));

  let unchanged = s.get_event(series.event_id).await.unwrap().unwrap();
  assert_eq!(unchanged.end_repeat, None);
}

#[tokio::test]
async fn editing_same_occurrence_twice_is_rejected() {
  let s = store().await;
  let series = s.create_event(climbing()).await.unwrap();
  let first =
    plan_and_apply(&s, &series, d(2025, 3, 22), SplitScope::One, retitle("Bouldering"))
      .await
      .unwrap();

  let again =
    split_series(&series, d(2025, 3, 22), SplitScope::One, retitle("Lead climbing")).unwrap();
  let err = s.apply_mutation(again).await.unwrap_err();
  assert!(matches!(
    err,
    Error::OccurrenceAlreadyCanceled { event_id, date }
      if event_id == series.event_id && date == d(2025, 3, 22)
  ));

  let got = agenda_dates(&s, d(2025, 3, 22), d(2025, 3, 22)).await;
  assert_eq!(got, vec![(d(2025, 3, 22), "Bouldering".to_owned())]);
  assert_eq!(s.get_event(first.event_id).await.unwrap(), Some(first));
}

#[tokio::test]
async fn stale_future_delete_is_rejected() {
  let s = store().await;
  let series = s.create_event(climbing()).await.unwrap();

  // Both planned from the same snapshot of the series.
  let april =
    split_series(&series, d(2025, 4, 1), SplitScope::Future, SplitOperation::Delete).unwrap();
  let may =
    split_series(&series, d(2025, 5, 3), SplitScope::Future, SplitOperation::Delete).unwrap();

  s.apply_mutation(april).await.unwrap();
  let err = s.apply_mutation(may).await.unwrap_err();
  assert!(matches!(err, Error::SeriesChanged(id) if id == series.event_id));

  let fetched = s.get_event(series.event_id).await.unwrap().unwrap();
  assert_eq!(fetched.end_repeat, Some(d(2025, 3, 31)));
  assert!(agenda_dates(&s, d(2025, 4, 1), d(2025, 4, 30)).await.is_empty());
}

#[tokio::test]
async fn stale_in_place_update_is_rejected() {
  let s = store().await;
  let series = s.create_event(climbing()).await.unwrap();

  let retitled =
    split_series(&series, series.start_date, SplitScope::Future, retitle("Gym")).unwrap();
  plan_and_apply(&s, &series, d(2025, 4, 1), SplitScope::Future, SplitOperation::Delete).await;

  let err = s.apply_mutation(retitled).await.unwrap_err();
  assert!(matches!(err, Error::SeriesChanged(id) if id == series.event_id));

  let fetched = s.get_event(series.event_id).await.unwrap().unwrap();
  assert_eq!(fetched.title, "Climbing");
  assert_eq!(fetched.end_repeat, Some(d(2025, 3, 31)));
}
