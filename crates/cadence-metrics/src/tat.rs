//! Turnaround-time evaluation: at-risk and exceeded signals per task,
//! plus sprint-level compliance.
//!
//! Days open are fractional and anchored at the assignment date, or
//! the creation date when no assignment was ever recorded. Closed
//! tasks are measured at their resolution date, so a finished sprint's
//! compliance never drifts as the calendar moves on.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use cadence_core::config::CadenceConfig;
use cadence_core::model::{Priority, Task};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Per-task signal
// ---------------------------------------------------------------------------

/// TAT position of one task at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TatSignal {
    /// Past the at-risk threshold for its ticket type.
    pub at_risk: bool,
    /// Past the exceeded threshold.
    pub exceeded: bool,
    /// Priority the task should be raised to, when the ticket type
    /// escalates on breach and the task is not already at maximum.
    pub escalated_priority: Option<Priority>,
    /// Fractional days the task has been open at evaluation time.
    pub days_open: f64,
}

/// Whether a subject marks a standing activity exempt from TAT.
#[must_use]
pub fn is_recurring(subject: &str, config: &CadenceConfig) -> bool {
    let subject = subject.to_lowercase();
    config
        .recurring
        .subject_keywords
        .iter()
        .any(|kw| subject.contains(&kw.to_lowercase()))
}

/// Evaluate a task's TAT signal as of `as_of`.
///
/// Closed tasks, recurring activities, and ticket types with no
/// configured threshold all come back clear. Both thresholds are
/// inclusive: a task exactly at the limit has crossed it.
#[must_use]
pub fn evaluate(task: &Task, as_of: NaiveDateTime, config: &CadenceConfig) -> TatSignal {
    let days_open = task.days_open(as_of);
    let signal = TatSignal {
        days_open,
        ..TatSignal::default()
    };

    if !task.in_backlog() || is_recurring(&task.external.subject, config) {
        return signal;
    }
    let Some(threshold) = config.tat_for(task.ticket_type) else {
        return signal;
    };

    let exceeded = days_open >= threshold.exceeded_days;
    let at_risk = days_open >= threshold.at_risk_days;
    let escalated_priority = (exceeded
        && threshold.escalate
        && task.effective_priority() != Some(Priority::MAX))
    .then_some(Priority::MAX);

    TatSignal {
        at_risk,
        exceeded,
        escalated_priority,
        days_open,
    }
}

// ---------------------------------------------------------------------------
// Sprint-level compliance
// ---------------------------------------------------------------------------

/// TAT counts for one ticket type within a sprint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeTatCounts {
    pub evaluated: usize,
    pub at_risk: usize,
    pub exceeded: usize,
}

impl TypeTatCounts {
    /// Share of this type's evaluated tasks inside their window.
    #[must_use]
    pub fn compliance_rate(&self) -> f64 {
        if self.evaluated == 0 {
            return 1.0;
        }
        (self.evaluated - self.exceeded) as f64 / self.evaluated as f64
    }
}

/// Aggregate TAT position of one sprint's tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SprintTatSummary {
    /// Tasks measured against a threshold.
    pub evaluated: usize,
    /// Recurring or unconfigured tasks skipped.
    pub exempt: usize,
    /// Open tasks currently past the at-risk line but not exceeded.
    pub at_risk: usize,
    /// Tasks past the exceeded line (open now, or closed late).
    pub exceeded: usize,
    /// The same counts broken down by ticket type label.
    pub by_type: BTreeMap<&'static str, TypeTatCounts>,
}

impl SprintTatSummary {
    /// Share of evaluated tasks inside their turnaround window.
    /// An empty sprint is vacuously compliant.
    #[must_use]
    pub fn compliance_rate(&self) -> f64 {
        if self.evaluated == 0 {
            return 1.0;
        }
        (self.evaluated - self.exceeded) as f64 / self.evaluated as f64
    }
}

/// Summarize TAT across a sprint's task list as of `as_of`.
///
/// Open tasks are measured at `as_of`; closed tasks at their recorded
/// resolution time, falling back to `as_of` when none was recorded.
#[must_use]
pub fn sprint_tat_summary(
    tasks: &[Task],
    as_of: NaiveDateTime,
    config: &CadenceConfig,
) -> SprintTatSummary {
    let mut summary = SprintTatSummary::default();

    for task in tasks {
        if is_recurring(&task.external.subject, config) {
            summary.exempt += 1;
            continue;
        }
        let Some(threshold) = config.tat_for(task.ticket_type) else {
            summary.exempt += 1;
            continue;
        };

        let measured_at = if task.in_backlog() {
            as_of
        } else {
            task.external.task_resolved.unwrap_or(as_of)
        };
        let days_open = task.days_open(measured_at);

        summary.evaluated += 1;
        let counts = summary.by_type.entry(task.ticket_type.as_str()).or_default();
        counts.evaluated += 1;
        if days_open >= threshold.exceeded_days {
            summary.exceeded += 1;
            counts.exceeded += 1;
        } else if task.in_backlog() && days_open >= threshold.at_risk_days {
            summary.at_risk += 1;
            counts.at_risk += 1;
        }
    }

    tracing::debug!(
        evaluated = summary.evaluated,
        exceeded = summary.exceeded,
        "sprint TAT summarized"
    );
    summary
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cadence_core::model::{
        Annotations, ExternalFields, SprintSet, TaskStatus, TicketType,
    };
    use chrono::NaiveDate;

    use super::*;

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn open_task(ticket_type: TicketType, assigned: NaiveDateTime) -> Task {
        Task {
            task_num: "T100".to_string(),
            external: ExternalFields {
                status: Some(TaskStatus::Assigned),
                subject: "replace pump seals".to_string(),
                task_assigned: Some(assigned),
                ..ExternalFields::default()
            },
            annotations: Annotations::default(),
            ticket_type,
            origin_sprint: None,
            sprints: SprintSet::default(),
        }
    }

    #[test]
    fn sr_boundary_is_inclusive_at_eighteen_days() {
        let config = CadenceConfig::default();
        let task = open_task(TicketType::Sr, dt(2026, 3, 2));

        let just_under = evaluate(&task, dt(2026, 3, 19), &config);
        assert!(!just_under.at_risk);

        let at_boundary = evaluate(&task, dt(2026, 3, 20), &config);
        assert!(at_boundary.at_risk);
        assert!(!at_boundary.exceeded);
    }

    #[test]
    fn ir_exceeded_escalates_to_max_priority() {
        let config = CadenceConfig::default();
        let task = open_task(TicketType::Ir, dt(2026, 3, 2));

        let signal = evaluate(&task, dt(2026, 3, 4), &config);
        assert!(signal.exceeded);
        assert_eq!(signal.escalated_priority, Some(Priority::MAX));
    }

    #[test]
    fn already_maximum_priority_does_not_re_escalate() {
        let config = CadenceConfig::default();
        let mut task = open_task(TicketType::Ir, dt(2026, 3, 2));
        task.annotations.final_priority = Some(Priority::MAX);

        let signal = evaluate(&task, dt(2026, 3, 4), &config);
        assert!(signal.exceeded);
        assert_eq!(signal.escalated_priority, None);
    }

    #[test]
    fn recurring_subject_is_exempt_case_insensitively() {
        let config = CadenceConfig::default();
        let mut task = open_task(TicketType::Sr, dt(2026, 1, 1));
        task.external.subject = "weekly STANDING meeting notes".to_string();

        let signal = evaluate(&task, dt(2026, 3, 1), &config);
        assert!(!signal.at_risk);
        assert!(!signal.exceeded);
    }

    #[test]
    fn closed_task_comes_back_clear() {
        let config = CadenceConfig::default();
        let mut task = open_task(TicketType::Sr, dt(2026, 1, 1));
        task.external.status = Some(TaskStatus::Completed);

        let signal = evaluate(&task, dt(2026, 3, 1), &config);
        assert!(!signal.at_risk);
        assert!(!signal.exceeded);
    }

    #[test]
    fn closed_tasks_measure_compliance_at_resolution_time() {
        let config = CadenceConfig::default();
        let mut late = open_task(TicketType::Sr, dt(2026, 1, 5));
        late.external.status = Some(TaskStatus::Completed);
        late.external.task_resolved = Some(dt(2026, 2, 10));

        let mut on_time = open_task(TicketType::Sr, dt(2026, 1, 5));
        on_time.external.status = Some(TaskStatus::Completed);
        on_time.external.task_resolved = Some(dt(2026, 1, 10));

        let summary = sprint_tat_summary(&[late, on_time], dt(2026, 6, 1), &config);
        assert_eq!(summary.evaluated, 2);
        assert_eq!(summary.exceeded, 1);
        assert!((summary.compliance_rate() - 0.5).abs() < f64::EPSILON);

        let sr = summary.by_type.get("SR").expect("SR counts");
        assert_eq!(sr.evaluated, 2);
        assert_eq!(sr.exceeded, 1);
        assert!((sr.compliance_rate() - 0.5).abs() < f64::EPSILON);
    }
}
