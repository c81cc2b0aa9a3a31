//! Field-ownership import reconciliation.
//!
//! External-owned fields are unconditionally overwritten from the
//! incoming batch; dashboard-owned fields and the membership set are
//! never touched; the computed origin sprint is resolved once at first
//! sighting and never recomputed. Re-running an identical batch is a
//! no-op: zero updates, zero field mutations.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use std::collections::BTreeMap;

use super::{TaskStore, dt_from_sql, dt_to_sql};
use crate::model::{ExternalFields, TaskStatus, TicketType};

/// One pre-mapped row from the external tracker's extract.
///
/// Column-name mapping from the raw extract is the caller's job; by
/// the time a row reaches the reconciler it is already in the target
/// schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub task_num: String,
    pub external: ExternalFields,
}

/// Outcome classification for a single reconciled row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowOutcome {
    New,
    Updated,
    Unchanged,
}

/// A status value change observed during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusTransition {
    pub task_num: String,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Per-import statistics handed back to the caller for reporting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    /// Rows in the incoming batch.
    pub total: usize,
    pub new_tasks: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Rows missing a required key.
    pub skipped_invalid: usize,
    /// Closed rows older than the configured import threshold.
    pub skipped_old_closed: usize,
    /// Per-row classification, in batch order (skipped rows omitted).
    pub outcomes: Vec<(String, RowOutcome)>,
    /// New tasks tallied by their arrival status.
    pub new_by_status: BTreeMap<String, usize>,
    /// External-owned field name -> number of tasks it changed on.
    pub field_changes: BTreeMap<&'static str, usize>,
    pub status_changes: Vec<StatusTransition>,
    pub ticket_status_changes: Vec<StatusTransition>,
}

impl ImportReport {
    /// Serialized form for audit logs and export surfaces.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl TaskStore {
    /// Reconcile a batch of external rows into the store.
    ///
    /// The whole batch commits as one transaction; bad rows are
    /// skipped and counted, never fatal.
    pub fn import(&mut self, rows: &[ImportRow]) -> Result<ImportReport> {
        let mut report = ImportReport {
            total: rows.len(),
            ..ImportReport::default()
        };

        let tx = self.conn.transaction().context("begin import")?;

        for row in rows {
            if row.task_num.trim().is_empty() || row.external.ticket_num.trim().is_empty() {
                tracing::debug!("import row skipped: missing task or ticket key");
                report.skipped_invalid += 1;
                continue;
            }

            if self.config.import.threshold_date.is_some_and(|threshold| {
                row.external
                    .task_created
                    .is_some_and(|created| created.date() < threshold)
            }) && !row.external.status.is_some_and(TaskStatus::is_open)
            {
                report.skipped_old_closed += 1;
                continue;
            }

            let existing = fetch_external(&tx, &row.task_num)?;
            match existing {
                None => {
                    insert_new_task(&tx, row, &self.calendar)?;
                    report.new_tasks += 1;
                    report
                        .outcomes
                        .push((row.task_num.clone(), RowOutcome::New));
                    let status = row
                        .external
                        .status
                        .map_or_else(|| "Unknown".to_string(), |s| s.to_string());
                    *report.new_by_status.entry(status).or_insert(0) += 1;
                }
                Some(old) => {
                    let changed = changed_fields(&old, &row.external);
                    if changed.is_empty() {
                        report.unchanged += 1;
                        report
                            .outcomes
                            .push((row.task_num.clone(), RowOutcome::Unchanged));
                        continue;
                    }

                    if changed.contains(&"status") {
                        report.status_changes.push(StatusTransition {
                            task_num: row.task_num.clone(),
                            from: old.status.map(|s| s.to_string()),
                            to: row.external.status.map(|s| s.to_string()),
                        });
                    }
                    if changed.contains(&"ticket_status") {
                        report.ticket_status_changes.push(StatusTransition {
                            task_num: row.task_num.clone(),
                            from: old.ticket_status.clone(),
                            to: row.external.ticket_status.clone(),
                        });
                    }
                    for field in &changed {
                        *report.field_changes.entry(field).or_insert(0) += 1;
                    }

                    overwrite_external(&tx, row)?;
                    report.updated += 1;
                    report
                        .outcomes
                        .push((row.task_num.clone(), RowOutcome::Updated));
                }
            }
        }

        tx.commit().context("commit import")?;

        tracing::info!(
            total = report.total,
            new = report.new_tasks,
            updated = report.updated,
            unchanged = report.unchanged,
            skipped = report.skipped_invalid + report.skipped_old_closed,
            "import reconciled"
        );
        Ok(report)
    }
}

fn fetch_external(conn: &Connection, task_num: &str) -> Result<Option<ExternalFields>> {
    conn.query_row(
        "SELECT ticket_num, status, ticket_status, assigned_to, subject, section,
                customer_name, task_created_dt, task_assigned_dt, task_resolved_dt,
                ticket_created_dt, ticket_resolved_dt
         FROM tasks WHERE task_num = ?1",
        [task_num],
        |row| {
            let status: Option<String> = row.get(1)?;
            Ok(ExternalFields {
                ticket_num: row.get(0)?,
                status: status.as_deref().and_then(|s| s.parse().ok()),
                ticket_status: row.get(2)?,
                assigned_to: row.get(3)?,
                subject: row.get(4)?,
                section: row.get(5)?,
                customer_name: row.get(6)?,
                task_created: dt_from_sql(row.get::<_, Option<String>>(7)?.as_deref()),
                task_assigned: dt_from_sql(row.get::<_, Option<String>>(8)?.as_deref()),
                task_resolved: dt_from_sql(row.get::<_, Option<String>>(9)?.as_deref()),
                ticket_created: dt_from_sql(row.get::<_, Option<String>>(10)?.as_deref()),
                ticket_resolved: dt_from_sql(row.get::<_, Option<String>>(11)?.as_deref()),
            })
        },
    )
    .optional()
    .context("fetch existing task")
}

/// Names of external-owned columns whose values differ.
fn changed_fields(old: &ExternalFields, new: &ExternalFields) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if old.ticket_num != new.ticket_num {
        changed.push("ticket_num");
    }
    if old.status != new.status {
        changed.push("status");
    }
    if old.ticket_status != new.ticket_status {
        changed.push("ticket_status");
    }
    if old.assigned_to != new.assigned_to {
        changed.push("assigned_to");
    }
    if old.subject != new.subject {
        changed.push("subject");
    }
    if old.section != new.section {
        changed.push("section");
    }
    if old.customer_name != new.customer_name {
        changed.push("customer_name");
    }
    if old.task_created != new.task_created {
        changed.push("task_created_dt");
    }
    if old.task_assigned != new.task_assigned {
        changed.push("task_assigned_dt");
    }
    if old.task_resolved != new.task_resolved {
        changed.push("task_resolved_dt");
    }
    if old.ticket_created != new.ticket_created {
        changed.push("ticket_created_dt");
    }
    if old.ticket_resolved != new.ticket_resolved {
        changed.push("ticket_resolved_dt");
    }
    changed
}

fn insert_new_task(
    conn: &Connection,
    row: &ImportRow,
    calendar: &crate::calendar::SprintCalendar,
) -> Result<()> {
    let ticket_type = TicketType::from_subject(&row.external.subject);

    // Origin sprint resolves through the assignment date (creation
    // date when never assigned) and is frozen from here on.
    let origin_date = row
        .external
        .task_assigned
        .or(row.external.task_created)
        .map(|dt| dt.date());
    let origin_sprint = origin_date.and_then(|d| calendar.sprint_for_date(d).map(|s| s.number));

    conn.execute(
        "INSERT INTO tasks (
            task_num, ticket_num, status, ticket_status, assigned_to, subject,
            section, customer_name, ticket_type,
            task_created_dt, task_assigned_dt, task_resolved_dt,
            ticket_created_dt, ticket_resolved_dt, origin_sprint,
            updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, datetime('now'))",
        params![
            row.task_num,
            row.external.ticket_num,
            row.external.status.map(|s| s.to_string()),
            row.external.ticket_status,
            row.external.assigned_to,
            row.external.subject,
            row.external.section,
            row.external.customer_name,
            ticket_type.to_string(),
            dt_to_sql(row.external.task_created),
            dt_to_sql(row.external.task_assigned),
            dt_to_sql(row.external.task_resolved),
            dt_to_sql(row.external.ticket_created),
            dt_to_sql(row.external.ticket_resolved),
            origin_sprint,
        ],
    )
    .context("insert task")?;

    // Dashboard-owned fields start at their defaults. Tasks arriving
    // already closed carry their resolution date as the status date.
    let status_update = if row.external.status.is_some_and(TaskStatus::is_closed) {
        row.external.task_resolved.or(row.external.ticket_resolved)
    } else {
        None
    };
    conn.execute(
        "INSERT INTO task_annotations (task_num, status_update_dt) VALUES (?1, ?2)",
        params![row.task_num, dt_to_sql(status_update)],
    )
    .context("insert annotations")?;

    // Closed tasks auto-file into the sprint they historically belong
    // to; open tasks land in the backlog with an empty set.
    if row.external.status.is_some_and(TaskStatus::is_closed) {
        if let Some(origin) = origin_sprint {
            conn.execute(
                "INSERT OR IGNORE INTO task_sprints (task_num, sprint_number) VALUES (?1, ?2)",
                params![row.task_num, origin],
            )
            .context("auto-file closed task")?;
        }
    }

    upsert_ticket(conn, row)?;
    Ok(())
}

fn overwrite_external(conn: &Connection, row: &ImportRow) -> Result<()> {
    conn.execute(
        "UPDATE tasks SET
            ticket_num = ?2, status = ?3, ticket_status = ?4, assigned_to = ?5,
            subject = ?6, section = ?7, customer_name = ?8,
            task_created_dt = ?9, task_assigned_dt = ?10, task_resolved_dt = ?11,
            ticket_created_dt = ?12, ticket_resolved_dt = ?13,
            updated_at = datetime('now')
         WHERE task_num = ?1",
        params![
            row.task_num,
            row.external.ticket_num,
            row.external.status.map(|s| s.to_string()),
            row.external.ticket_status,
            row.external.assigned_to,
            row.external.subject,
            row.external.section,
            row.external.customer_name,
            dt_to_sql(row.external.task_created),
            dt_to_sql(row.external.task_assigned),
            dt_to_sql(row.external.task_resolved),
            dt_to_sql(row.external.ticket_created),
            dt_to_sql(row.external.ticket_resolved),
        ],
    )
    .context("overwrite external fields")?;

    upsert_ticket(conn, row)?;
    Ok(())
}

/// Keep the parent ticket row current with the latest task sighting.
fn upsert_ticket(conn: &Connection, row: &ImportRow) -> Result<()> {
    conn.execute(
        "INSERT INTO tickets (ticket_num, ticket_status, subject, customer_name, section,
                              ticket_created_dt, ticket_resolved_dt)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(ticket_num) DO UPDATE SET
            ticket_status = excluded.ticket_status,
            subject = excluded.subject,
            customer_name = excluded.customer_name,
            section = excluded.section,
            ticket_created_dt = excluded.ticket_created_dt,
            ticket_resolved_dt = excluded.ticket_resolved_dt",
        params![
            row.external.ticket_num,
            row.external.ticket_status,
            row.external.subject,
            row.external.customer_name,
            row.external.section,
            dt_to_sql(row.external.ticket_created),
            dt_to_sql(row.external.ticket_resolved),
        ],
    )
    .context("upsert ticket")?;
    Ok(())
}
