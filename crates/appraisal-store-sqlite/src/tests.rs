//! Integration tests for `SqliteStore` against in-memory and on-disk
//! databases.

use appraisal_core::{
  Error as CoreError,
  assignment::{AssignmentStatus, Scope},
  form::{FormWeights, NewForm},
  score::{
    AdditionalAnswers, CompetencyScore, DevPlanItem, NewCompetency, NewKpi,
    SaveAll, SaveStatus, TimeAttendance,
  },
  step::StepStatus,
  store::{EvaluationStore, FormPage},
  summary::NewGradeBand,
};
use chrono::NaiveDate;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn form(s: &SqliteStore) -> i64 {
  s.create_form(NewForm {
    title: "Annual review".into(),
    weights: FormWeights { kpi_weight: 60, comp_weight: 30, ta_weight: 10 },
    ..Default::default()
  })
  .await
  .unwrap()
  .form_id
}

fn kpi(title: &str, weight: i32, score: f64, max_score: f64) -> NewKpi {
  NewKpi {
    title: title.into(),
    weight,
    score,
    max_score,
    ..Default::default()
  }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn domain(err: &Error) -> Option<&CoreError> {
  match err {
    Error::Core(e) => Some(e),
    _ => None,
  }
}

// ─── Forms ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_form() {
  let s = store().await;
  let id = form(&s).await;

  let fetched = s.get_form(id).await.unwrap().expect("form exists");
  assert_eq!(fetched.title, "Annual review");
  assert_eq!(fetched.total_weight, 100);
  assert_eq!(fetched.weights.kpi_weight, 60);
}

#[tokio::test]
async fn get_form_missing_returns_none() {
  let s = store().await;
  assert!(s.get_form(404).await.unwrap().is_none());
}

#[tokio::test]
async fn list_forms_newest_first_with_paging() {
  let s = store().await;
  for title in ["a", "b", "c"] {
    s.create_form(NewForm { title: title.into(), ..Default::default() })
      .await
      .unwrap();
  }

  let all = s.list_forms(FormPage::default()).await.unwrap();
  let titles: Vec<_> = all.iter().map(|f| f.title.as_str()).collect();
  assert_eq!(titles, ["c", "b", "a"]);

  let page = s.list_forms(FormPage::new(Some(1), Some(1))).await.unwrap();
  assert_eq!(page.len(), 1);
  assert_eq!(page[0].title, "b");
}

#[tokio::test]
async fn form_without_title_is_rejected() {
  let s = store().await;
  let err = s.create_form(NewForm::default()).await.unwrap_err();
  assert!(matches!(domain(&err), Some(CoreError::Validation(_))));
}

// ─── Assignments ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn ensure_assignment_is_idempotent() {
  let s = store().await;
  let scope = Scope::new(form(&s).await, 7);

  let first = s.ensure_assignment(scope, None).await.unwrap();
  let second = s.ensure_assignment(scope, None).await.unwrap();
  assert_eq!(first.assignment_id, second.assignment_id);
  assert_eq!(first.status, AssignmentStatus::Draft);
  assert_eq!(first.due_date, Some(s.today()));
}

#[tokio::test]
async fn ensure_assignment_updates_due_date() {
  let s = store().await;
  let scope = Scope::new(form(&s).await, 7);
  s.ensure_assignment(scope, None).await.unwrap();

  let due = date(2025, 12, 31);
  let updated = s.ensure_assignment(scope, Some(due)).await.unwrap();
  assert_eq!(updated.due_date, Some(due));

  let kept = s.ensure_assignment(scope, None).await.unwrap();
  assert_eq!(kept.due_date, Some(due));
}

#[tokio::test]
async fn ensure_assignment_on_unknown_form_fails() {
  let s = store().await;
  let err = s.ensure_assignment(Scope::new(99, 7), None).await.unwrap_err();
  assert!(matches!(domain(&err), Some(CoreError::FormNotFound(99))));
  assert!(s.get_assignment(Scope::new(99, 7)).await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_ensure_creates_one_row() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("appraisal.db");
  let a = SqliteStore::open(&path).await.unwrap();
  let b = SqliteStore::open(&path).await.unwrap();
  let scope = Scope::new(form(&a).await, 7);

  let (x, y) =
    tokio::join!(a.ensure_assignment(scope, None), b.ensure_assignment(scope, None));
  assert_eq!(x.unwrap().assignment_id, y.unwrap().assignment_id);
}

// ─── KPIs ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_kpis_creates_assignment_and_appends() {
  let s = store().await;
  let scope = Scope::new(form(&s).await, 7);

  let batch = s
    .add_kpis(scope, None, vec![kpi("Sales", 60, 8.0, 10.0)])
    .await
    .unwrap();
  assert_eq!(batch.items.len(), 1);
  s.add_kpis(scope, None, vec![kpi("Quality", 40, 5.0, 10.0)])
    .await
    .unwrap();

  let listed = s.list_kpis(scope).await.unwrap();
  assert_eq!(listed.len(), 2);
  assert!(listed.iter().all(|k| k.assignment_id == batch.assignment_id));
}

#[tokio::test]
async fn replace_kpis_swaps_whole_set() {
  let s = store().await;
  let scope = Scope::new(form(&s).await, 7);
  s.add_kpis(scope, None, vec![kpi("a", 50, 1.0, 5.0), kpi("b", 50, 1.0, 5.0)])
    .await
    .unwrap();

  let replaced = s
    .replace_kpis(scope, None, vec![kpi("c", 100, 4.0, 5.0)])
    .await
    .unwrap();
  assert_eq!(replaced.len(), 1);

  let listed = s.list_kpis(scope).await.unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].title, "c");
}

#[tokio::test]
async fn update_and_delete_kpi_are_scoped_to_the_owner() {
  let s = store().await;
  let form_id = form(&s).await;
  let owner = Scope::new(form_id, 7);
  let other = Scope::new(form_id, 8);
  s.ensure_assignment(other, None).await.unwrap();

  let batch = s
    .add_kpis(owner, None, vec![kpi("Sales", 100, 3.0, 10.0)])
    .await
    .unwrap();
  let kpi_id = batch.items[0].kpi_id;

  assert!(
    s.update_kpi(other, kpi_id, kpi("Stolen", 1, 0.0, 1.0))
      .await
      .unwrap()
      .is_none()
  );
  assert!(!s.delete_kpi(other, kpi_id).await.unwrap());

  let updated = s
    .update_kpi(owner, kpi_id, kpi("Sales", 100, 9.0, 10.0))
    .await
    .unwrap()
    .expect("owner can update");
  assert_eq!(updated.score, 9.0);
  assert_eq!(s.list_kpis(owner).await.unwrap()[0].score, 9.0);

  assert!(s.delete_kpi(owner, kpi_id).await.unwrap());
  assert!(s.list_kpis(owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn list_kpis_without_assignment_is_empty() {
  let s = store().await;
  let scope = Scope::new(form(&s).await, 7);
  assert!(s.list_kpis(scope).await.unwrap().is_empty());
  assert!(s.get_assignment(scope).await.unwrap().is_none());
}

// ─── Competencies and grade bands ────────────────────────────────────────────

#[tokio::test]
async fn competency_weights_are_stored_as_ratios() {
  let s = store().await;
  let form_id = form(&s).await;
  let added = s
    .add_competencies(form_id, vec![
      NewCompetency { title: "Teamwork".into(), weight: 70.0, max_score: 5.0, ..Default::default() },
      NewCompetency { title: "Ownership".into(), weight: 0.3, max_score: 4.0, ..Default::default() },
    ])
    .await
    .unwrap();
  assert!((added[0].weight - 0.7).abs() < 1e-12);

  let listed = s.list_competencies(form_id).await.unwrap();
  let weights: Vec<_> = listed.iter().map(|c| c.weight).collect();
  assert!((weights[0] - 0.7).abs() < 1e-12);
  assert!((weights[1] - 0.3).abs() < 1e-12);
}

#[tokio::test]
async fn competencies_need_an_existing_form() {
  let s = store().await;
  let err = s
    .add_competencies(5, vec![NewCompetency::default()])
    .await
    .unwrap_err();
  assert!(matches!(domain(&err), Some(CoreError::FormNotFound(5))));
}

#[tokio::test]
async fn grade_bands_filter_by_form() {
  let s = store().await;
  let f1 = form(&s).await;
  let f2 = form(&s).await;
  for (form_id, grade) in [(None, "G"), (Some(f1), "F1"), (Some(f2), "F2")] {
    s.add_grade_band(NewGradeBand {
      form_id,
      min_pct: 0.0,
      max_pct: 100.0,
      grade: grade.into(),
    })
    .await
    .unwrap();
  }

  assert_eq!(s.list_grade_bands(None).await.unwrap().len(), 3);
  let for_f1: Vec<_> = s
    .list_grade_bands(Some(f1))
    .await
    .unwrap()
    .into_iter()
    .map(|b| b.grade)
    .collect();
  assert_eq!(for_f1.len(), 2);
  assert!(for_f1.contains(&"G".to_owned()));
  assert!(for_f1.contains(&"F1".to_owned()));
}

// ─── SaveAll and summary ─────────────────────────────────────────────────────

async fn full_form(s: &SqliteStore) -> (Scope, Vec<i64>) {
  let form_id = form(s).await;
  let comps = s
    .add_competencies(form_id, vec![
      NewCompetency { title: "Teamwork".into(), weight: 70.0, max_score: 5.0, ..Default::default() },
      NewCompetency { title: "Ownership".into(), weight: 0.3, max_score: 4.0, ..Default::default() },
    ])
    .await
    .unwrap();
  (
    Scope::new(form_id, 7),
    comps.into_iter().map(|c| c.competency_id).collect(),
  )
}

fn payload(competencies: &[i64], status: SaveStatus) -> SaveAll {
  SaveAll {
    status,
    due_date: Some(date(2025, 6, 30)),
    kpis: vec![kpi("Sales", 60, 8.0, 10.0), kpi("Quality", 40, 5.0, 10.0)],
    competency_scores: vec![
      CompetencyScore { competency_id: competencies[0], score: 5.0, note: String::new() },
      CompetencyScore { competency_id: competencies[1], score: 4.0, note: "solid".into() },
    ],
    time_attendance: TimeAttendance { full_score: 10.0, score: 10.0 },
    development_plan: vec![DevPlanItem {
      idx: 1,
      content: "Lead a project".into(),
      priority: "High".into(),
      timing: Some(date(2025, 9, 1)),
      remarks: String::new(),
    }],
    additional: AdditionalAnswers { q1: "More training".into(), ..Default::default() },
  }
}

#[tokio::test]
async fn save_all_then_load_round_trips_every_section() {
  let s = store().await;
  let (scope, comps) = full_form(&s).await;

  let saved = s.save_all(scope, payload(&comps, SaveStatus::Draft)).await.unwrap();
  assert_eq!(saved.status, AssignmentStatus::Draft);

  let snap = s.load_form_data(scope).await.unwrap();
  assert_eq!(snap.assignment_id, Some(saved.assignment_id));
  assert_eq!(snap.due_date, Some(date(2025, 6, 30)));
  assert_eq!(snap.kpis.len(), 2);
  assert_eq!(snap.competencies.len(), 2);
  assert_eq!(snap.competencies[1].note, "solid");
  assert_eq!(snap.time_attendance.score, 10.0);
  assert_eq!(snap.development_plan[0].timing, Some(date(2025, 9, 1)));
  assert_eq!(snap.additional.q1, "More training");
}

#[tokio::test]
async fn summary_combines_weighted_components() {
  let s = store().await;
  let (scope, comps) = full_form(&s).await;
  s.add_grade_band(NewGradeBand {
    form_id: None,
    min_pct: 80.0,
    max_pct: 100.0,
    grade: "A".into(),
  })
  .await
  .unwrap();
  s.save_all(scope, payload(&comps, SaveStatus::Draft)).await.unwrap();

  let summary = s.compute_summary(scope).await.unwrap();
  assert!((summary.kpi_pct - 68.0).abs() < 1e-9);
  assert!((summary.comp_pct - 100.0).abs() < 1e-9);
  assert!((summary.ta_pct - 100.0).abs() < 1e-9);
  // 68 * 0.6 + 100 * 0.3 + 100 * 0.1
  assert!((summary.total_pct - 80.8).abs() < 1e-9);
  assert_eq!(summary.grade, "A");
}

#[tokio::test]
async fn form_specific_band_wins_over_global() {
  let s = store().await;
  let form_id = form(&s).await;
  let scope = Scope::new(form_id, 7);
  for (band_form, grade) in [(None, "D"), (Some(form_id), "C")] {
    s.add_grade_band(NewGradeBand {
      form_id: band_form,
      min_pct: 0.0,
      max_pct: 59.0,
      grade: grade.into(),
    })
    .await
    .unwrap();
  }
  // KPI only: 50 % KPI at weight 60 gives a 30 % total.
  s.add_kpis(scope, None, vec![kpi("Sales", 100, 5.0, 10.0)])
    .await
    .unwrap();

  let summary = s.compute_summary(scope).await.unwrap();
  assert_eq!(summary.grade, "C");
}

#[tokio::test]
async fn submitted_assignment_is_frozen() {
  let s = store().await;
  let (scope, comps) = full_form(&s).await;
  s.save_all(scope, payload(&comps, SaveStatus::Submitted))
    .await
    .unwrap();
  let before = s.load_form_data(scope).await.unwrap();
  assert_eq!(before.status, AssignmentStatus::Submitted);

  let mut again = payload(&comps, SaveStatus::Draft);
  again.kpis = vec![kpi("Changed", 100, 1.0, 1.0)];
  again.time_attendance = TimeAttendance { full_score: 1.0, score: 0.0 };
  let err = s.save_all(scope, again).await.unwrap_err();
  assert!(matches!(domain(&err), Some(CoreError::AlreadySubmitted(_))));

  let err = s
    .add_kpis(scope, None, vec![kpi("Late", 10, 1.0, 1.0)])
    .await
    .unwrap_err();
  assert!(matches!(domain(&err), Some(CoreError::AlreadySubmitted(_))));
  let kpi_id = before.kpis[0].kpi_id;
  assert!(s.delete_kpi(scope, kpi_id).await.is_err());

  let after = s.load_form_data(scope).await.unwrap();
  assert_eq!(after.kpis, before.kpis);
  assert_eq!(after.competencies, before.competencies);
  assert_eq!(after.time_attendance, before.time_attendance);
  assert_eq!(after.due_date, before.due_date);
}

#[tokio::test]
async fn save_all_failure_rolls_back_every_section() {
  let s = store().await;
  let (scope, comps) = full_form(&s).await;
  s.save_all(scope, payload(&comps, SaveStatus::Draft)).await.unwrap();
  let before = s.load_form_data(scope).await.unwrap();

  let mut bad = payload(&comps, SaveStatus::Submitted);
  bad.kpis = vec![kpi("Replaced", 100, 1.0, 1.0)];
  bad.competency_scores.push(CompetencyScore {
    competency_id: 9_999,
    score: 1.0,
    note: String::new(),
  });
  let err = s.save_all(scope, bad).await.unwrap_err();
  assert!(matches!(domain(&err), Some(CoreError::Validation(_))));

  let after = s.load_form_data(scope).await.unwrap();
  assert_eq!(after.status, AssignmentStatus::Draft);
  assert_eq!(after.kpis, before.kpis);
}

#[tokio::test]
async fn expired_write_deadline_rolls_back() {
  let s = store()
    .await
    .with_write_timeout(Some(std::time::Duration::ZERO));
  let err = s
    .create_form(NewForm { title: "late".into(), ..Default::default() })
    .await
    .unwrap_err();
  assert!(matches!(domain(&err), Some(CoreError::DeadlineExceeded)));

  let s = s.with_write_timeout(None);
  assert!(s.list_forms(FormPage::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn abandoned_write_rolls_back() {
  use std::{future::Future as _, pin::pin, task::Poll, time::Duration};

  let s = store().await;
  let scope = Scope::new(form(&s).await, 42);

  // Park the connection thread so the write is still queued when dropped.
  let mut stall = pin!(s.stall(Duration::from_millis(100)));
  let mut write =
    Box::pin(s.add_kpis(scope, None, vec![kpi("Sales", 100, 5.0, 10.0)]));
  std::future::poll_fn(|cx| {
    assert!(stall.as_mut().poll(cx).is_pending());
    assert!(write.as_mut().poll(cx).is_pending());
    Poll::Ready(())
  })
  .await;
  drop(write);
  stall.await.unwrap();

  let snap = s.load_form_data(scope).await.unwrap();
  assert!(snap.assignment_id.is_none());
  assert!(snap.kpis.is_empty());
  assert!(s.list_kpis(scope).await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_state_read_is_zeroed() {
  let s = store().await;
  let scope = Scope::new(form(&s).await, 42);

  let snap = s.load_form_data(scope).await.unwrap();
  assert!(snap.assignment_id.is_none());
  assert!(snap.kpis.is_empty());
  assert!(snap.competencies.is_empty());
  assert!(snap.development_plan.is_empty());
  assert_eq!(snap.time_attendance, TimeAttendance::default());
  assert_eq!(snap.summary.grade, "N/A");

  let summary = s.compute_summary(scope).await.unwrap();
  assert_eq!(summary.total_pct, 0.0);
  assert_eq!(summary.grade, "N/A");
}

// ─── Steps ───────────────────────────────────────────────────────────────────

fn statuses(steps: &[appraisal_core::step::EvalStep]) -> Vec<StepStatus> {
  steps.iter().map(|s| s.status).collect()
}

#[tokio::test]
async fn step_chain_hands_over_one_at_a_time() {
  use StepStatus::*;

  let s = store().await;
  let scope = Scope::new(form(&s).await, 7);
  s.upsert_person(100, "Alice").await.unwrap();

  let batch = s.add_steps(scope, vec![100, 200, 300]).await.unwrap();
  assert_eq!(statuses(&batch.steps), [Active, Pending, Pending]);
  assert_eq!(batch.steps[0].evaluator_name, "Alice");
  assert_eq!(batch.steps[1].evaluator_name, "");

  let ids: Vec<_> = batch.steps.iter().map(|s| s.step_id).collect();
  let (f, owner) = (scope.form_id, scope.person_id);

  s.update_step(f, owner, ids[0], Done, Some(date(2025, 1, 10)))
    .await
    .unwrap();
  assert_eq!(statuses(&s.list_steps(scope).await.unwrap()), [Done, Active, Pending]);

  // Evaluators complete their own steps.
  s.update_step(f, 200, ids[1], Done, None).await.unwrap();
  assert_eq!(statuses(&s.list_steps(scope).await.unwrap()), [Done, Done, Active]);

  s.update_step(f, 300, ids[2], Done, None).await.unwrap();
  let last = s.list_steps(scope).await.unwrap();
  assert_eq!(statuses(&last), [Done, Done, Done]);
  assert_eq!(last[0].eval_date, Some(date(2025, 1, 10)));
}

#[tokio::test]
async fn steps_are_created_once() {
  let s = store().await;
  let scope = Scope::new(form(&s).await, 7);
  s.add_steps(scope, vec![1, 2]).await.unwrap();

  let err = s.add_steps(scope, vec![3]).await.unwrap_err();
  assert!(matches!(domain(&err), Some(CoreError::StepsAlreadyExist(_))));
  assert_eq!(s.list_steps(scope).await.unwrap().len(), 2);
}

#[tokio::test]
async fn step_rules_are_enforced() {
  let s = store().await;
  let scope = Scope::new(form(&s).await, 7);
  let steps = s.add_steps(scope, vec![1, 2]).await.unwrap().steps;
  let (f, owner) = (scope.form_id, scope.person_id);

  // Wrong form.
  assert!(
    s.update_step(f + 1, owner, steps[0].step_id, StepStatus::Done, None)
      .await
      .unwrap()
      .is_none()
  );

  // Backwards.
  let err = s
    .update_step(f, owner, steps[0].step_id, StepStatus::Pending, None)
    .await
    .unwrap_err();
  assert!(matches!(domain(&err), Some(CoreError::InvalidTransition { .. })));

  // A second active step.
  let err = s
    .update_step(f, owner, steps[1].step_id, StepStatus::Active, None)
    .await
    .unwrap_err();
  assert!(matches!(domain(&err), Some(CoreError::AnotherStepActive(_))));
}

#[tokio::test]
async fn strangers_cannot_touch_a_chain() {
  let s = store().await;
  let scope = Scope::new(form(&s).await, 7);
  let steps = s.add_steps(scope, vec![7, 20]).await.unwrap().steps;
  let f = scope.form_id;

  assert!(
    s.update_step(f, 999, steps[0].step_id, StepStatus::Done, None)
      .await
      .unwrap()
      .is_none()
  );
  // An evaluator only reaches their own step.
  assert!(
    s.update_step(f, 20, steps[0].step_id, StepStatus::Done, None)
      .await
      .unwrap()
      .is_none()
  );
  assert_eq!(
    statuses(&s.list_steps(scope).await.unwrap()),
    [StepStatus::Active, StepStatus::Pending]
  );
}

#[tokio::test]
async fn omitted_eval_date_clears_it() {
  let s = store().await;
  let scope = Scope::new(form(&s).await, 7);
  let id = s.add_steps(scope, vec![7, 20]).await.unwrap().steps[0].step_id;
  let f = scope.form_id;

  let step = s
    .update_step(f, 7, id, StepStatus::Active, Some(date(2025, 3, 1)))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(step.eval_date, Some(date(2025, 3, 1)));

  let step = s
    .update_step(f, 7, id, StepStatus::Active, None)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(step.eval_date, None);
}

#[tokio::test]
async fn concurrent_completion_activates_next_exactly_once() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("appraisal.db");
  let a = SqliteStore::open(&path).await.unwrap();
  let b = SqliteStore::open(&path).await.unwrap();

  let scope = Scope::new(form(&a).await, 7);
  let steps = a.add_steps(scope, vec![1, 2, 3]).await.unwrap().steps;
  let first = steps[0].step_id;

  let (x, y) = tokio::join!(
    a.update_step(scope.form_id, 7, first, StepStatus::Done, None),
    b.update_step(scope.form_id, 7, first, StepStatus::Done, None),
  );
  let outcomes = [x, y];
  assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
  let loser = outcomes.iter().find_map(|r| r.as_ref().err()).unwrap();
  assert!(matches!(domain(loser), Some(CoreError::InvalidTransition { .. })));

  let after = a.list_steps(scope).await.unwrap();
  assert_eq!(
    statuses(&after),
    [StepStatus::Done, StepStatus::Active, StepStatus::Pending]
  );
}
