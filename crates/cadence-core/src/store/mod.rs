//! The cadence task store: an explicit repository object over SQLite.
//!
//! One `TaskStore` is constructed at startup and passed to everything
//! that needs it; there is no process-wide singleton. Every public
//! mutating operation runs as a single SQLite transaction, so each
//! unit of work (an import batch, one assignment, a worklog merge)
//! commits all-or-nothing.

pub mod assignment;
pub mod reconcile;
pub mod worklog;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::str::FromStr;

use crate::calendar::SprintCalendar;
use crate::config::CadenceConfig;
use crate::db;
use crate::model::{
    Annotations, ExternalFields, GoalType, Priority, Sprint, SprintSet, Task, TaskStatus,
    TicketType,
};

pub use assignment::AnnotationPatch;
pub use reconcile::{ImportReport, ImportRow, RowOutcome, StatusTransition};
pub use worklog::{SprintWorklogTotals, WorklogMergeReport, WorklogRow};

/// Errors from store operations: either a storage failure or a
/// user-correctable validation failure to display inline.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
    #[error(transparent)]
    Invalid(#[from] crate::error::AssignError),
}

impl StoreError {
    /// The stable machine code for this failure.
    #[must_use]
    pub fn error_code(&self) -> crate::error::ErrorCode {
        match self {
            Self::Db(_) => crate::error::ErrorCode::StoreWriteFailed,
            Self::Invalid(err) => err.error_code(),
        }
    }
}

const TASK_COLUMNS: &str = "t.task_num, t.ticket_num, t.status, t.ticket_status, t.assigned_to, \
     t.subject, t.section, t.customer_name, t.ticket_type, \
     t.task_created_dt, t.task_assigned_dt, t.task_resolved_dt, \
     t.ticket_created_dt, t.ticket_resolved_dt, t.origin_sprint, \
     a.customer_priority, a.final_priority, a.goal_type, a.hours_estimated, \
     a.dependency_on, a.dependencies_lead, a.dependency_secured, \
     a.comments, a.non_completion_reason, a.status_update_dt";

/// Repository over tasks, sprint calendar, and worklogs.
pub struct TaskStore {
    conn: Connection,
    calendar: SprintCalendar,
    config: CadenceConfig,
}

impl TaskStore {
    /// Open an on-disk store, loading and validating the persisted
    /// sprint calendar.
    pub fn open(path: &Path, config: CadenceConfig) -> Result<Self> {
        let conn = db::open_store(path)?;
        Self::with_connection(conn, config)
    }

    /// In-memory store for tests and dry runs.
    pub fn in_memory(config: CadenceConfig) -> Result<Self> {
        let conn = db::open_in_memory()?;
        Self::with_connection(conn, config)
    }

    fn with_connection(conn: Connection, config: CadenceConfig) -> Result<Self> {
        config.validate()?;
        let calendar = load_calendar(&conn).context("load sprint calendar")?;
        Ok(Self {
            conn,
            calendar,
            config,
        })
    }

    /// The validated sprint calendar.
    #[must_use]
    pub fn calendar(&self) -> &SprintCalendar {
        &self.calendar
    }

    #[must_use]
    pub fn config(&self) -> &CadenceConfig {
        &self.config
    }

    /// Append a sprint to the calendar. Rejected if it would overlap
    /// an existing window or reuse a number; existing rows are never
    /// modified or deleted.
    pub fn add_sprint(&mut self, sprint: Sprint) -> Result<()> {
        let mut sprints = self.calendar.sprints().to_vec();
        sprints.push(sprint.clone());
        let next = SprintCalendar::new(sprints).context("validate sprint calendar")?;

        self.conn
            .execute(
                "INSERT INTO sprint_calendar (sprint_number, sprint_name, sprint_start_dt, sprint_end_dt)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    sprint.number,
                    sprint.name,
                    date_to_sql(sprint.start),
                    date_to_sql(sprint.end)
                ],
            )
            .context("insert sprint")?;

        self.calendar = next;
        tracing::info!(sprint = sprint.number, start = %sprint.start, "sprint added to calendar");
        Ok(())
    }

    /// Fetch one task with annotations and membership, if present.
    pub fn get_task(&self, task_num: &str) -> Result<Option<Task>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS}
             FROM tasks t LEFT JOIN task_annotations a ON a.task_num = t.task_num
             WHERE t.task_num = ?1"
        );
        let task = self
            .conn
            .query_row(&sql, [task_num], task_from_row)
            .optional()
            .context("query task")?;

        match task {
            Some(mut task) => {
                task.sprints = self.membership(&task.task_num)?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    /// All tasks in the store, ordered by task number.
    pub fn all_tasks(&self) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS}
             FROM tasks t LEFT JOIN task_annotations a ON a.task_num = t.task_num
             ORDER BY t.task_num"
        );
        self.collect_tasks(&sql, [])
    }

    /// Tasks whose membership set contains `sprint_number`. Closed
    /// tasks stay listed; sprint views are history, not a backlog.
    pub fn sprint_tasks(&self, sprint_number: u32) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS}
             FROM tasks t
             LEFT JOIN task_annotations a ON a.task_num = t.task_num
             JOIN task_sprints ts ON ts.task_num = t.task_num
             WHERE ts.sprint_number = ?1
             ORDER BY t.task_num"
        );
        self.collect_tasks(&sql, [sprint_number])
    }

    /// The backlog view: every open-status task, regardless of its
    /// membership set. Closed tasks never appear here.
    pub fn backlog_tasks(&self) -> Result<Vec<Task>> {
        let open: Vec<String> = [
            TaskStatus::Logged,
            TaskStatus::Assigned,
            TaskStatus::Accepted,
            TaskStatus::Waiting,
        ]
        .iter()
        .map(|s| format!("'{s}'"))
        .collect();
        let sql = format!(
            "SELECT {TASK_COLUMNS}
             FROM tasks t LEFT JOIN task_annotations a ON a.task_num = t.task_num
             WHERE t.status IN ({})
             ORDER BY t.task_num",
            open.join(", ")
        );
        self.collect_tasks(&sql, [])
    }

    fn collect_tasks<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(sql).context("prepare task query")?;
        let rows = stmt
            .query_map(params, task_from_row)
            .context("query tasks")?;

        let mut tasks = Vec::new();
        for row in rows {
            let mut task = row.context("read task row")?;
            task.sprints = self.membership(&task.task_num)?;
            tasks.push(task);
        }
        Ok(tasks)
    }

    fn membership(&self, task_num: &str) -> Result<SprintSet> {
        let mut stmt = self
            .conn
            .prepare("SELECT sprint_number FROM task_sprints WHERE task_num = ?1")
            .context("prepare membership query")?;
        let rows = stmt
            .query_map([task_num], |row| row.get::<_, u32>(0))
            .context("query membership")?;

        let mut set = SprintSet::new();
        for row in rows {
            set.insert(row.context("read membership row")?);
        }
        Ok(set)
    }
}

fn load_calendar(conn: &Connection) -> Result<SprintCalendar> {
    let mut stmt = conn.prepare(
        "SELECT sprint_number, sprint_name, sprint_start_dt, sprint_end_dt
         FROM sprint_calendar ORDER BY sprint_start_dt",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, u32>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut sprints = Vec::new();
    for row in rows {
        let (number, name, start, end) = row?;
        let start = date_from_sql(&start)
            .with_context(|| format!("sprint {number}: bad start date '{start}'"))?;
        let end = date_from_sql(&end)
            .with_context(|| format!("sprint {number}: bad end date '{end}'"))?;
        sprints.push(Sprint {
            number,
            name,
            start,
            end,
        });
    }

    SprintCalendar::new(sprints).context("sprint calendar failed validation")
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let task_num: String = row.get(0)?;
    let status: Option<String> = row.get(2)?;
    let ticket_type: String = row.get(8)?;
    let goal_type: Option<String> = row.get(17)?;

    Ok(Task {
        task_num,
        external: ExternalFields {
            ticket_num: row.get(1)?,
            status: status.as_deref().and_then(|s| TaskStatus::from_str(s).ok()),
            ticket_status: row.get(3)?,
            assigned_to: row.get(4)?,
            subject: row.get(5)?,
            section: row.get(6)?,
            customer_name: row.get(7)?,
            task_created: dt_from_sql(row.get::<_, Option<String>>(9)?.as_deref()),
            task_assigned: dt_from_sql(row.get::<_, Option<String>>(10)?.as_deref()),
            task_resolved: dt_from_sql(row.get::<_, Option<String>>(11)?.as_deref()),
            ticket_created: dt_from_sql(row.get::<_, Option<String>>(12)?.as_deref()),
            ticket_resolved: dt_from_sql(row.get::<_, Option<String>>(13)?.as_deref()),
        },
        annotations: Annotations {
            customer_priority: priority_from_sql(row.get(15)?),
            final_priority: priority_from_sql(row.get(16)?),
            goal_type: goal_type.as_deref().and_then(|s| GoalType::from_str(s).ok()),
            hours_estimated: row.get(18)?,
            dependency_on: row.get(19)?,
            dependencies_lead: row.get(20)?,
            dependency_secured: row.get(21)?,
            comments: row.get(22)?,
            non_completion_reason: row.get(23)?,
            status_update_dt: dt_from_sql(row.get::<_, Option<String>>(24)?.as_deref()),
        },
        ticket_type: TicketType::from_str(&ticket_type).unwrap_or(TicketType::Nc),
        origin_sprint: row.get(14)?,
        sprints: SprintSet::new(),
    })
}

fn priority_from_sql(value: Option<i64>) -> Option<Priority> {
    value.and_then(|v| Priority::new(v).ok())
}

pub(crate) fn dt_to_sql(value: Option<NaiveDateTime>) -> Option<String> {
    value.map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
}

pub(crate) fn dt_from_sql(value: Option<&str>) -> Option<NaiveDateTime> {
    value.and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok())
}

pub(crate) fn date_to_sql(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

pub(crate) fn date_from_sql(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}
