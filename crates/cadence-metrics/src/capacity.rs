//! Per-assignee capacity aggregation for one sprint's task list.
//!
//! Estimated hours are summed per assignee and split by goal tag.
//! Untagged tasks count toward the combined load but toward neither
//! goal category, so the category bands only ever reflect explicit
//! commitments.

use std::collections::BTreeMap;

use cadence_core::config::CapacityConfig;
use cadence_core::model::{GoalType, Task};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Bands
// ---------------------------------------------------------------------------

/// How a load compares against its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityBand {
    /// Comfortably under the limit.
    Ok,
    /// At or past the warning threshold but not over.
    Warning,
    /// Past the limit.
    Over,
}

/// Classify `hours` against `limit` with the configured warning band.
#[must_use]
pub fn band(hours: f64, limit: f64, warning_percent: u8) -> CapacityBand {
    if hours > limit {
        CapacityBand::Over
    } else if hours >= limit * f64::from(warning_percent) / 100.0 {
        CapacityBand::Warning
    } else {
        CapacityBand::Ok
    }
}

// ---------------------------------------------------------------------------
// Per-assignee aggregation
// ---------------------------------------------------------------------------

/// One assignee's estimated load within a sprint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssigneeCapacity {
    pub assignee: String,
    /// Hours on mandatory-tagged tasks.
    pub mandatory_hours: f64,
    /// Hours on stretch-tagged tasks.
    pub stretch_hours: f64,
    /// Hours on tasks with no goal tag.
    pub untagged_hours: f64,
    /// Tasks counted, including those with no estimate.
    pub task_count: usize,
    /// Tasks missing an hour estimate.
    pub unestimated: usize,
}

impl AssigneeCapacity {
    fn new(assignee: String) -> Self {
        Self {
            assignee,
            mandatory_hours: 0.0,
            stretch_hours: 0.0,
            untagged_hours: 0.0,
            task_count: 0,
            unestimated: 0,
        }
    }

    /// Combined load across all goal tags.
    #[must_use]
    pub fn total_hours(&self) -> f64 {
        self.mandatory_hours + self.stretch_hours + self.untagged_hours
    }

    #[must_use]
    pub fn mandatory_band(&self, config: &CapacityConfig) -> CapacityBand {
        band(
            self.mandatory_hours,
            config.mandatory_hours,
            config.warning_percent,
        )
    }

    #[must_use]
    pub fn stretch_band(&self, config: &CapacityConfig) -> CapacityBand {
        band(
            self.stretch_hours,
            config.stretch_hours,
            config.warning_percent,
        )
    }

    #[must_use]
    pub fn total_band(&self, config: &CapacityConfig) -> CapacityBand {
        band(
            self.total_hours(),
            config.total_hours,
            config.warning_percent,
        )
    }
}

/// Aggregate a sprint's tasks into per-assignee loads, sorted by
/// assignee name. Tasks with no assignee fall under `"(unassigned)"`.
#[must_use]
pub fn sprint_capacity(tasks: &[Task]) -> Vec<AssigneeCapacity> {
    let mut by_assignee: BTreeMap<String, AssigneeCapacity> = BTreeMap::new();

    for task in tasks {
        let assignee = task
            .external
            .assigned_to
            .clone()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| "(unassigned)".to_string());
        let entry = by_assignee
            .entry(assignee.clone())
            .or_insert_with(|| AssigneeCapacity::new(assignee));

        entry.task_count += 1;
        let Some(hours) = task.annotations.hours_estimated else {
            entry.unestimated += 1;
            continue;
        };
        match task.annotations.goal_type {
            Some(GoalType::Mandatory) => entry.mandatory_hours += hours,
            Some(GoalType::Stretch) => entry.stretch_hours += hours,
            None => entry.untagged_hours += hours,
        }
    }

    let caps: Vec<_> = by_assignee.into_values().collect();
    tracing::debug!(assignees = caps.len(), tasks = tasks.len(), "capacity aggregated");
    caps
}

#[cfg(test)]
mod tests {
    use cadence_core::model::{Annotations, ExternalFields, SprintSet, TicketType};

    use super::*;

    fn task(assignee: &str, goal: Option<GoalType>, hours: Option<f64>) -> Task {
        Task {
            task_num: format!("T-{assignee}"),
            external: ExternalFields {
                assigned_to: Some(assignee.to_string()),
                ..ExternalFields::default()
            },
            annotations: Annotations {
                goal_type: goal,
                hours_estimated: hours,
                ..Annotations::default()
            },
            ticket_type: TicketType::Sr,
            origin_sprint: None,
            sprints: SprintSet::default(),
        }
    }

    #[test]
    fn untagged_hours_count_in_total_only() {
        let tasks = vec![
            task("ana", Some(GoalType::Mandatory), Some(10.0)),
            task("ana", Some(GoalType::Stretch), Some(4.0)),
            task("ana", None, Some(6.0)),
        ];
        let caps = sprint_capacity(&tasks);
        assert_eq!(caps.len(), 1);
        let ana = &caps[0];
        assert!((ana.mandatory_hours - 10.0).abs() < f64::EPSILON);
        assert!((ana.stretch_hours - 4.0).abs() < f64::EPSILON);
        assert!((ana.untagged_hours - 6.0).abs() < f64::EPSILON);
        assert!((ana.total_hours() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unestimated_tasks_are_counted_but_add_no_hours() {
        let tasks = vec![
            task("bo", Some(GoalType::Mandatory), Some(8.0)),
            task("bo", Some(GoalType::Mandatory), None),
        ];
        let caps = sprint_capacity(&tasks);
        assert_eq!(caps[0].task_count, 2);
        assert_eq!(caps[0].unestimated, 1);
        assert!((caps[0].mandatory_hours - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_assignee_groups_under_unassigned() {
        let mut t = task("x", None, Some(1.0));
        t.external.assigned_to = None;
        let caps = sprint_capacity(&[t]);
        assert_eq!(caps[0].assignee, "(unassigned)");
    }

    #[test]
    fn band_boundaries_are_inclusive_at_warning_and_exclusive_at_limit() {
        // warning_percent 85, limit 48: warning begins at 40.8.
        assert_eq!(band(40.7, 48.0, 85), CapacityBand::Ok);
        assert_eq!(band(40.8, 48.0, 85), CapacityBand::Warning);
        assert_eq!(band(48.0, 48.0, 85), CapacityBand::Warning);
        assert_eq!(band(48.1, 48.0, 85), CapacityBand::Over);
    }

    #[test]
    fn per_assignee_totals_add_up_to_the_sprint_total() {
        let mut unassigned = task("x", Some(GoalType::Stretch), Some(3.0));
        unassigned.external.assigned_to = None;
        let tasks = vec![
            task("ana", Some(GoalType::Mandatory), Some(10.0)),
            task("ana", None, Some(6.5)),
            task("bo", Some(GoalType::Stretch), Some(4.0)),
            task("bo", Some(GoalType::Mandatory), None),
            task("cy", None, Some(0.5)),
            unassigned,
        ];

        let expected: f64 = tasks
            .iter()
            .filter_map(|t| t.annotations.hours_estimated)
            .sum();
        let summed: f64 = sprint_capacity(&tasks).iter().map(AssigneeCapacity::total_hours).sum();
        assert!((summed - expected).abs() < 1e-9);
    }

    #[test]
    fn assignees_are_sorted_by_name() {
        let tasks = vec![
            task("zoe", None, Some(1.0)),
            task("ana", None, Some(1.0)),
        ];
        let caps = sprint_capacity(&tasks);
        assert_eq!(caps[0].assignee, "ana");
        assert_eq!(caps[1].assignee, "zoe");
    }
}
