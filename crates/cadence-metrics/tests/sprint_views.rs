//! Capacity and TAT views computed from a live store, end to end:
//! import, annotate, plan, then aggregate.

use cadence_core::config::CadenceConfig;
use cadence_core::model::{ExternalFields, GoalType, Sprint, TaskStatus};
use cadence_core::store::{AnnotationPatch, ImportRow, TaskStore};
use cadence_metrics::{CapacityBand, sprint_capacity, sprint_tat_summary};
use chrono::{NaiveDate, NaiveDateTime};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(9, 0, 0).expect("valid time")
}

fn row(task_num: &str, assignee: &str, subject: &str, assigned: NaiveDateTime) -> ImportRow {
    ImportRow {
        task_num: task_num.to_string(),
        external: ExternalFields {
            ticket_num: format!("TKT-{task_num}"),
            status: Some(TaskStatus::Assigned),
            assigned_to: Some(assignee.to_string()),
            subject: subject.to_string(),
            task_created: Some(assigned),
            task_assigned: Some(assigned),
            ..ExternalFields::default()
        },
    }
}

fn planned_store() -> TaskStore {
    let mut store = TaskStore::in_memory(CadenceConfig::default()).expect("store");
    store
        .add_sprint(Sprint {
            number: 4,
            name: "26-4".into(),
            start: date(2026, 3, 5),
            end: date(2026, 3, 18),
        })
        .expect("sprint");

    store
        .import(&[
            row("T1", "ana", "LAB-SR: replace pump seals", dt(2026, 3, 6)),
            row("T2", "ana", "LAB-SR: inspect valves", dt(2026, 3, 6)),
            row("T3", "bo", "weekly Standing Meeting", dt(2026, 3, 6)),
        ])
        .expect("import");

    for (task, goal, hours) in [
        ("T1", Some(GoalType::Mandatory), 44.0),
        ("T2", Some(GoalType::Stretch), 8.0),
        ("T3", None, 2.0),
    ] {
        store
            .update_annotations(
                task,
                &AnnotationPatch {
                    goal_type: Some(goal),
                    hours_estimated: Some(Some(hours)),
                    ..AnnotationPatch::default()
                },
            )
            .expect("annotate");
        store.assign(task, 4).expect("assign");
    }
    store
}

#[test]
fn capacity_view_reflects_planned_estimates() {
    let store = planned_store();
    let tasks = store.sprint_tasks(4).expect("sprint tasks");
    let caps = sprint_capacity(&tasks);

    let ana = caps.iter().find(|c| c.assignee == "ana").expect("ana");
    assert!((ana.mandatory_hours - 44.0).abs() < f64::EPSILON);
    assert!((ana.stretch_hours - 8.0).abs() < f64::EPSILON);
    // 44 of 48 mandatory hours is inside the 85% warning band.
    assert_eq!(ana.mandatory_band(&store.config().capacity), CapacityBand::Warning);
    assert_eq!(ana.total_band(&store.config().capacity), CapacityBand::Ok);

    let bo = caps.iter().find(|c| c.assignee == "bo").expect("bo");
    assert!((bo.untagged_hours - 2.0).abs() < f64::EPSILON);
}

#[test]
fn tat_summary_exempts_recurring_and_flags_aging_work() {
    let store = planned_store();
    let tasks = store.sprint_tasks(4).expect("sprint tasks");

    // 20 days after assignment: SRs are at risk (18) but not exceeded (22).
    let summary = sprint_tat_summary(&tasks, dt(2026, 3, 26), store.config());
    assert_eq!(summary.exempt, 1);
    assert_eq!(summary.evaluated, 2);
    assert_eq!(summary.at_risk, 2);
    assert_eq!(summary.exceeded, 0);
    assert!((summary.compliance_rate() - 1.0).abs() < f64::EPSILON);
}
