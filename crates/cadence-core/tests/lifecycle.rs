//! Sprint membership lifecycle: assignment laws, carryover, manual
//! status edits, and annotation patches.

use std::collections::BTreeSet;

use cadence_core::config::CadenceConfig;
use cadence_core::error::AssignError;
use cadence_core::model::{ExternalFields, Sprint, TaskStatus};
use cadence_core::store::{AnnotationPatch, ImportRow, StoreError, TaskStore};
use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(10, 0, 0).expect("valid time")
}

fn store_with_task(task_num: &str, assigned: NaiveDateTime) -> TaskStore {
    let mut store = TaskStore::in_memory(CadenceConfig::default()).expect("store");
    for (number, start, end) in [
        (4, date(2026, 3, 5), date(2026, 3, 18)),
        (5, date(2026, 3, 19), date(2026, 4, 1)),
        (6, date(2026, 4, 2), date(2026, 4, 15)),
    ] {
        store
            .add_sprint(Sprint {
                number,
                name: format!("26-{number}"),
                start,
                end,
            })
            .expect("sprint");
    }
    store
        .import(&[ImportRow {
            task_num: task_num.to_string(),
            external: ExternalFields {
                ticket_num: format!("TKT-{task_num}"),
                status: Some(TaskStatus::Assigned),
                assigned_to: Some("ana".into()),
                subject: "replace pump seals".into(),
                task_created: Some(assigned),
                task_assigned: Some(assigned),
                ..ExternalFields::default()
            },
        }])
        .expect("import");
    store
}

fn membership(store: &TaskStore, task_num: &str) -> Vec<u32> {
    store
        .get_task(task_num)
        .expect("query")
        .expect("present")
        .sprints
        .iter()
        .collect()
}

#[test]
fn task_lifecycle_from_backlog_through_carryover_to_close() {
    // T1 arrives open with an assignment date inside sprint 4's window.
    let mut store = store_with_task("T1", dt(2026, 3, 6));
    let task = store.get_task("T1").expect("query").expect("present");
    assert_eq!(task.origin_sprint, Some(4));
    assert!(task.sprints.is_empty());
    assert!(task.in_backlog());

    // Planned into sprint 4, then carried over into 5.
    store.assign("T1", 4).expect("assign 4");
    assert_eq!(membership(&store, "T1"), vec![4]);
    store.assign("T1", 5).expect("assign 5");
    assert_eq!(membership(&store, "T1"), vec![4, 5]);

    // Dropping sprint 4 keeps 5 intact.
    store.remove("T1", 4).expect("remove 4");
    assert_eq!(membership(&store, "T1"), vec![5]);

    // Closing via import leaves the backlog but not the sprint view.
    let mut closed = ImportRow {
        task_num: "T1".into(),
        external: store
            .get_task("T1")
            .expect("query")
            .expect("present")
            .external,
    };
    closed.external.status = Some(TaskStatus::Completed);
    closed.external.task_resolved = Some(dt(2026, 3, 25));
    store.import(&[closed]).expect("close via import");

    assert!(store.backlog_tasks().expect("backlog").is_empty());
    let in_five = store.sprint_tasks(5).expect("sprint view");
    assert_eq!(in_five.len(), 1);
    assert_eq!(in_five[0].task_num, "T1");
    assert_eq!(membership(&store, "T1"), vec![5]);
}

#[test]
fn open_task_stays_in_backlog_whatever_its_membership() {
    let mut store = store_with_task("T1", dt(2026, 3, 6));
    store
        .update_status("T1", TaskStatus::Accepted, dt(2026, 3, 7))
        .expect("status");
    store.assign("T1", 4).expect("assign");

    // Backlog keys on status alone; planning into a sprint does not
    // remove an open task from it.
    let backlog = store.backlog_tasks().expect("backlog");
    assert_eq!(backlog.len(), 1);
    assert_eq!(backlog[0].task_num, "T1");
    assert!(backlog[0].sprints.contains(4));
}

#[test]
fn duplicate_assign_and_absent_remove_are_rejected() {
    let mut store = store_with_task("T1", dt(2026, 3, 6));
    store.assign("T1", 4).expect("assign");

    let dup = store.assign("T1", 4);
    assert!(matches!(
        dup,
        Err(StoreError::Invalid(AssignError::AlreadyAssigned { .. }))
    ));

    let absent = store.remove("T1", 5);
    assert!(matches!(
        absent,
        Err(StoreError::Invalid(AssignError::NotAssigned { .. }))
    ));
    assert_eq!(membership(&store, "T1"), vec![4]);
}

#[test]
fn unknown_sprint_and_unknown_task_are_rejected() {
    let mut store = store_with_task("T1", dt(2026, 3, 6));

    assert!(matches!(
        store.assign("T1", 99),
        Err(StoreError::Invalid(AssignError::SprintNotFound(99)))
    ));
    assert!(matches!(
        store.assign("NOPE", 4),
        Err(StoreError::Invalid(AssignError::TaskNotFound(_)))
    ));
}

#[test]
fn assignment_before_origin_sprint_is_rejected() {
    // Origin resolves to sprint 5; sprint 4 predates the task.
    let mut store = store_with_task("T1", dt(2026, 3, 20));
    let err = store.assign("T1", 4);
    assert!(matches!(
        err,
        Err(StoreError::Invalid(AssignError::BeforeOriginSprint {
            sprint: 4,
            origin: 5,
            ..
        }))
    ));
    store.assign("T1", 5).expect("origin sprint itself is fine");
}

#[test]
fn failed_move_rolls_back_the_remove() {
    let mut store = store_with_task("T1", dt(2026, 3, 6));
    store.assign("T1", 4).expect("assign");

    let err = store.move_task("T1", 4, Some(99));
    assert!(err.is_err());
    // The remove half must not have committed.
    assert_eq!(membership(&store, "T1"), vec![4]);

    store.move_task("T1", 4, Some(5)).expect("move");
    assert_eq!(membership(&store, "T1"), vec![5]);

    store.move_task("T1", 5, None).expect("move to backlog");
    assert_eq!(membership(&store, "T1"), Vec::<u32>::new());
}

#[test]
fn bulk_assign_commits_good_rows_and_reports_bad_ones() {
    let mut store = store_with_task("T1", dt(2026, 3, 6));
    store
        .import(&[ImportRow {
            task_num: "T2".into(),
            external: ExternalFields {
                ticket_num: "TKT-T2".into(),
                status: Some(TaskStatus::Logged),
                subject: "inspect valves".into(),
                task_created: Some(dt(2026, 3, 7)),
                ..ExternalFields::default()
            },
        }])
        .expect("import");
    store.assign("T1", 4).expect("pre-assign");

    let (assigned, failures) = store
        .assign_many(&["T1".into(), "T2".into(), "GHOST".into()], 4)
        .expect("bulk assign");
    assert_eq!(assigned, 1);
    assert_eq!(failures.len(), 2);
    assert_eq!(membership(&store, "T2"), vec![4]);
}

#[test]
fn manual_status_edit_validates_the_effective_date() {
    let mut store = store_with_task("T1", dt(2026, 3, 6));

    let too_early = store.update_status("T1", TaskStatus::Completed, dt(2026, 3, 1));
    assert!(matches!(
        too_early,
        Err(StoreError::Invalid(
            AssignError::StatusDateBeforeAssignment { .. }
        ))
    ));

    store
        .update_status("T1", TaskStatus::Completed, dt(2026, 3, 12))
        .expect("close");
    let task = store.get_task("T1").expect("query").expect("present");
    assert_eq!(task.external.status, Some(TaskStatus::Completed));
    assert_eq!(task.annotations.status_update_dt, Some(dt(2026, 3, 12)));
}

#[test]
fn annotation_patch_validates_and_clears() {
    let mut store = store_with_task("T1", dt(2026, 3, 6));

    let bad_priority = store.update_annotations(
        "T1",
        &AnnotationPatch {
            final_priority: Some(Some(9)),
            ..AnnotationPatch::default()
        },
    );
    assert!(matches!(
        bad_priority,
        Err(StoreError::Invalid(AssignError::PriorityOutOfRange(9)))
    ));

    let bad_hours = store.update_annotations(
        "T1",
        &AnnotationPatch {
            hours_estimated: Some(Some(-4.0)),
            ..AnnotationPatch::default()
        },
    );
    assert!(matches!(
        bad_hours,
        Err(StoreError::Invalid(AssignError::InvalidEstimate(_)))
    ));

    store
        .update_annotations(
            "T1",
            &AnnotationPatch {
                comments: Some(Some("blocked on vendor".into())),
                ..AnnotationPatch::default()
            },
        )
        .expect("set comment");
    store
        .update_annotations(
            "T1",
            &AnnotationPatch {
                comments: Some(None),
                ..AnnotationPatch::default()
            },
        )
        .expect("clear comment");
    let task = store.get_task("T1").expect("query").expect("present");
    assert_eq!(task.annotations.comments, None);
}

#[derive(Debug, Clone)]
enum Op {
    Assign(u32),
    Remove(u32),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (4u32..=6).prop_map(Op::Assign),
        (4u32..=6).prop_map(Op::Remove),
    ]
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(64))]

    // The stored membership set always equals a plain set model fed
    // the same accepted operations.
    #[test]
    fn membership_matches_a_set_model(ops in prop::collection::vec(arb_op(), 0..24)) {
        let mut store = store_with_task("T1", dt(2026, 3, 6));
        let mut model: BTreeSet<u32> = BTreeSet::new();

        for op in ops {
            match op {
                Op::Assign(n) => {
                    let accepted = store.assign("T1", n).is_ok();
                    prop_assert_eq!(accepted, model.insert(n));
                }
                Op::Remove(n) => {
                    let accepted = store.remove("T1", n).is_ok();
                    prop_assert_eq!(accepted, model.remove(&n));
                }
            }
        }

        let stored: BTreeSet<u32> = membership(&store, "T1").into_iter().collect();
        prop_assert_eq!(stored, model);
    }
}
