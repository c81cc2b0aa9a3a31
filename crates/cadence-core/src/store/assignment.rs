//! Sprint assignment set operations and dashboard-owned field edits.
//!
//! Membership only ever changes through `assign` and `remove` (and
//! `move_task`, which is the two composed atomically). Validation
//! failures come back as values for inline display; they never abort
//! the caller.

use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, params};

use super::{StoreError, TaskStore, dt_from_sql, dt_to_sql};
use crate::calendar::SprintCalendar;
use crate::error::AssignError;
use crate::model::{Annotations, GoalType, Priority, TaskStatus};

/// Partial edit of dashboard-owned fields.
///
/// Outer `None` leaves the field alone; `Some(None)` clears it;
/// `Some(Some(v))` sets it. Priorities arrive raw and are range-checked
/// here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationPatch {
    pub customer_priority: Option<Option<i64>>,
    pub final_priority: Option<Option<i64>>,
    pub goal_type: Option<Option<GoalType>>,
    pub hours_estimated: Option<Option<f64>>,
    pub dependency_on: Option<Option<String>>,
    pub dependencies_lead: Option<Option<String>>,
    pub dependency_secured: Option<Option<String>>,
    pub comments: Option<Option<String>>,
    pub non_completion_reason: Option<Option<String>>,
}

impl TaskStore {
    /// Add `sprint_number` to a task's membership set.
    ///
    /// Fails when the sprint is unknown, already a member, or precedes
    /// the task's origin sprint (no back-assignment before creation).
    pub fn assign(&mut self, task_num: &str, sprint_number: u32) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        assign_in(&tx, &self.calendar, task_num, sprint_number)?;
        tx.commit()?;
        tracing::info!(task = task_num, sprint = sprint_number, "assigned to sprint");
        Ok(())
    }

    /// Remove exactly `sprint_number` from a task's membership set.
    /// All other memberships are untouched; an empty result set puts
    /// the task back in the unassigned backlog.
    pub fn remove(&mut self, task_num: &str, sprint_number: u32) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        remove_in(&tx, task_num, sprint_number)?;
        tx.commit()?;
        tracing::info!(task = task_num, sprint = sprint_number, "removed from sprint");
        Ok(())
    }

    /// Move a task between sprints: remove(from) + assign(to) as one
    /// atomic unit. A blank `to` degrades to a pure remove.
    pub fn move_task(
        &mut self,
        task_num: &str,
        from_sprint: u32,
        to_sprint: Option<u32>,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        remove_in(&tx, task_num, from_sprint)?;
        if let Some(to) = to_sprint {
            assign_in(&tx, &self.calendar, task_num, to)?;
        }
        tx.commit()?;
        tracing::info!(task = task_num, from = from_sprint, to = ?to_sprint, "moved");
        Ok(())
    }

    /// Assign a batch of tasks to one sprint. Per-task validation
    /// failures are collected and reported; the rest still commit.
    pub fn assign_many(
        &mut self,
        task_nums: &[String],
        sprint_number: u32,
    ) -> Result<(usize, Vec<(String, AssignError)>), StoreError> {
        let tx = self.conn.transaction()?;
        let mut assigned = 0;
        let mut failures = Vec::new();

        for task_num in task_nums {
            match assign_in(&tx, &self.calendar, task_num, sprint_number) {
                Ok(()) => assigned += 1,
                Err(StoreError::Invalid(reason)) => failures.push((task_num.clone(), reason)),
                Err(err @ StoreError::Db(_)) => return Err(err),
            }
        }

        tx.commit()?;
        tracing::info!(
            sprint = sprint_number,
            assigned,
            skipped = failures.len(),
            "bulk sprint assignment"
        );
        Ok((assigned, failures))
    }

    /// Manually set a task's status with an effective date.
    ///
    /// The effective date must not precede the task's assignment date.
    pub fn update_status(
        &mut self,
        task_num: &str,
        status: TaskStatus,
        effective: NaiveDateTime,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;

        let assigned: Option<String> = tx
            .query_row(
                "SELECT task_assigned_dt FROM tasks WHERE task_num = ?1",
                [task_num],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| AssignError::TaskNotFound(task_num.to_string()))?;

        if let Some(assigned) = dt_from_sql(assigned.as_deref()) {
            if effective < assigned {
                return Err(AssignError::StatusDateBeforeAssignment {
                    task: task_num.to_string(),
                    effective,
                    assigned,
                }
                .into());
            }
        }

        tx.execute(
            "UPDATE tasks SET status = ?2, updated_at = datetime('now') WHERE task_num = ?1",
            params![task_num, status.to_string()],
        )?;
        tx.execute(
            "UPDATE task_annotations SET status_update_dt = ?2 WHERE task_num = ?1",
            params![task_num, dt_to_sql(Some(effective))],
        )?;
        tx.commit()?;
        tracing::info!(task = task_num, status = %status, "status updated");
        Ok(())
    }

    /// Apply a partial edit to a task's dashboard-owned fields.
    pub fn update_annotations(
        &mut self,
        task_num: &str,
        patch: &AnnotationPatch,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;

        let mut current = fetch_annotations(&tx, task_num)?
            .ok_or_else(|| AssignError::TaskNotFound(task_num.to_string()))?;
        apply_patch(&mut current, patch)?;

        tx.execute(
            "UPDATE task_annotations SET
                customer_priority = ?2, final_priority = ?3, goal_type = ?4,
                hours_estimated = ?5, dependency_on = ?6, dependencies_lead = ?7,
                dependency_secured = ?8, comments = ?9, non_completion_reason = ?10
             WHERE task_num = ?1",
            params![
                task_num,
                current.customer_priority.map(|p| i64::from(p.value())),
                current.final_priority.map(|p| i64::from(p.value())),
                current.goal_type.map(|g| g.to_string()),
                current.hours_estimated,
                current.dependency_on,
                current.dependencies_lead,
                current.dependency_secured,
                current.comments,
                current.non_completion_reason,
            ],
        )?;
        tx.commit()?;
        tracing::debug!(task = task_num, "annotations updated");
        Ok(())
    }
}

fn assign_in(
    conn: &Connection,
    calendar: &SprintCalendar,
    task_num: &str,
    sprint_number: u32,
) -> Result<(), StoreError> {
    if calendar.by_number(sprint_number).is_none() {
        return Err(AssignError::SprintNotFound(sprint_number).into());
    }

    let origin: Option<Option<u32>> = conn
        .query_row(
            "SELECT origin_sprint FROM tasks WHERE task_num = ?1",
            [task_num],
            |row| row.get(0),
        )
        .optional()?;
    let Some(origin) = origin else {
        return Err(AssignError::TaskNotFound(task_num.to_string()).into());
    };

    if let Some(origin) = origin {
        if sprint_number < origin {
            return Err(AssignError::BeforeOriginSprint {
                task: task_num.to_string(),
                sprint: sprint_number,
                origin,
            }
            .into());
        }
    }

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO task_sprints (task_num, sprint_number) VALUES (?1, ?2)",
        params![task_num, sprint_number],
    )?;
    if inserted == 0 {
        return Err(AssignError::AlreadyAssigned {
            task: task_num.to_string(),
            sprint: sprint_number,
        }
        .into());
    }
    Ok(())
}

fn remove_in(conn: &Connection, task_num: &str, sprint_number: u32) -> Result<(), StoreError> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM tasks WHERE task_num = ?1",
            [task_num],
            |row| row.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Err(AssignError::TaskNotFound(task_num.to_string()).into());
    }

    let removed = conn.execute(
        "DELETE FROM task_sprints WHERE task_num = ?1 AND sprint_number = ?2",
        params![task_num, sprint_number],
    )?;
    if removed == 0 {
        return Err(AssignError::NotAssigned {
            task: task_num.to_string(),
            sprint: sprint_number,
        }
        .into());
    }
    Ok(())
}

fn fetch_annotations(conn: &Connection, task_num: &str) -> Result<Option<Annotations>, StoreError> {
    let row = conn
        .query_row(
            "SELECT customer_priority, final_priority, goal_type, hours_estimated,
                    dependency_on, dependencies_lead, dependency_secured,
                    comments, non_completion_reason, status_update_dt
             FROM task_annotations WHERE task_num = ?1",
            [task_num],
            |row| {
                let goal_type: Option<String> = row.get(2)?;
                Ok(Annotations {
                    customer_priority: row
                        .get::<_, Option<i64>>(0)?
                        .and_then(|v| Priority::new(v).ok()),
                    final_priority: row
                        .get::<_, Option<i64>>(1)?
                        .and_then(|v| Priority::new(v).ok()),
                    goal_type: goal_type.as_deref().and_then(|s| s.parse().ok()),
                    hours_estimated: row.get(3)?,
                    dependency_on: row.get(4)?,
                    dependencies_lead: row.get(5)?,
                    dependency_secured: row.get(6)?,
                    comments: row.get(7)?,
                    non_completion_reason: row.get(8)?,
                    status_update_dt: dt_from_sql(row.get::<_, Option<String>>(9)?.as_deref()),
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn apply_patch(current: &mut Annotations, patch: &AnnotationPatch) -> Result<(), AssignError> {
    if let Some(value) = &patch.customer_priority {
        current.customer_priority = parse_priority(*value)?;
    }
    if let Some(value) = &patch.final_priority {
        current.final_priority = parse_priority(*value)?;
    }
    if let Some(value) = &patch.goal_type {
        current.goal_type = *value;
    }
    if let Some(value) = &patch.hours_estimated {
        if let Some(hours) = value {
            if !hours.is_finite() || *hours < 0.0 {
                return Err(AssignError::InvalidEstimate(*hours));
            }
        }
        current.hours_estimated = *value;
    }
    if let Some(value) = &patch.dependency_on {
        current.dependency_on = value.clone();
    }
    if let Some(value) = &patch.dependencies_lead {
        current.dependencies_lead = value.clone();
    }
    if let Some(value) = &patch.dependency_secured {
        current.dependency_secured = value.clone();
    }
    if let Some(value) = &patch.comments {
        current.comments = value.clone();
    }
    if let Some(value) = &patch.non_completion_reason {
        current.non_completion_reason = value.clone();
    }
    Ok(())
}

fn parse_priority(raw: Option<i64>) -> Result<Option<Priority>, AssignError> {
    raw.map(|v| Priority::new(v).map_err(AssignError::PriorityOutOfRange))
        .transpose()
}
