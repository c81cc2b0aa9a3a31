//! Worklog ingestion and time-spent queries.
//!
//! Imports merge by date partition: every log date present in the
//! incoming batch has its stored rows replaced wholesale; dates absent
//! from the batch keep whatever the store already holds. A partial
//! export therefore never silently erases history outside its window.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rusqlite::params;
use serde::Serialize;

use super::{StoreError, TaskStore, date_from_sql, date_to_sql};
use crate::model::WorklogEntry;

/// One raw row from a worklog export, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorklogRow {
    pub record_id: String,
    pub task_num: String,
    pub owner: String,
    pub minutes_spent: i64,
    pub log_date: Option<NaiveDate>,
}

/// Outcome counts from one worklog merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorklogMergeReport {
    /// Rows in the incoming batch.
    pub total: usize,
    /// Rows that passed validation (after duplicate-id collapse).
    pub valid: usize,
    /// Rows dropped: blank keys, negative minutes, or missing date.
    pub invalid: usize,
    /// Distinct log dates whose partition was rewritten.
    pub dates_touched: usize,
    /// Previously stored rows deleted by partition rewrites.
    pub replaced: usize,
    /// Previously stored rows on untouched dates, left as-is.
    pub preserved: usize,
}

impl WorklogMergeReport {
    /// Serialized form for audit logs and export surfaces.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Aggregated hours for one sprint window, `None` for entries whose
/// log date falls outside every sprint in the calendar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SprintWorklogTotals {
    pub sprint_number: Option<u32>,
    pub entries: usize,
    pub total_hours: f64,
    /// Distinct people who logged time in the window.
    pub owners: usize,
    /// Distinct dates with at least one entry.
    pub days: usize,
}

impl TaskStore {
    /// Merge a worklog export into the store.
    ///
    /// Duplicate record ids within the batch collapse to the last
    /// occurrence, and a record id already stored on a date outside
    /// the batch is treated as moved: its stale row is replaced. Each
    /// row's sprint is resolved from its log date against the calendar
    /// at merge time.
    pub fn merge_worklogs(&mut self, rows: &[WorklogRow]) -> Result<WorklogMergeReport, StoreError> {
        let mut report = WorklogMergeReport {
            total: rows.len(),
            ..WorklogMergeReport::default()
        };

        // Last occurrence of a record id wins, as in the source export.
        let mut by_id: BTreeMap<&str, &WorklogRow> = BTreeMap::new();
        for row in rows {
            if row.record_id.trim().is_empty()
                || row.task_num.trim().is_empty()
                || row.minutes_spent < 0
                || row.log_date.is_none()
            {
                report.invalid += 1;
                continue;
            }
            if by_id.insert(row.record_id.as_str(), row).is_some() {
                report.invalid += 1;
            }
        }
        report.valid = by_id.len();

        let mut dates: BTreeSet<NaiveDate> = BTreeSet::new();
        for row in by_id.values() {
            if let Some(date) = row.log_date {
                dates.insert(date);
            }
        }
        report.dates_touched = dates.len();

        let tx = self.conn.transaction()?;
        let before: usize =
            tx.query_row("SELECT COUNT(*) FROM worklogs", [], |row| row.get(0))?;

        for date in &dates {
            report.replaced += tx.execute(
                "DELETE FROM worklogs WHERE log_date = ?1",
                [date_to_sql(*date)],
            )?;
        }

        // A record id can reappear on a different date (date correction
        // in the source system). Its stale row lives on an untouched
        // partition, so purge by id before inserting.
        {
            let mut purge = tx.prepare("DELETE FROM worklogs WHERE record_id = ?1")?;
            for row in by_id.values() {
                report.replaced += purge.execute([row.record_id.as_str()])?;
            }
        }
        report.preserved = before - report.replaced;

        {
            let mut insert = tx.prepare(
                "INSERT INTO worklogs
                    (record_id, task_num, owner, minutes_spent, log_date, sprint_number)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for row in by_id.values() {
                let Some(date) = row.log_date else { continue };
                let sprint = self.calendar.sprint_for_date(date).map(|s| s.number);
                insert.execute(params![
                    row.record_id,
                    row.task_num,
                    row.owner,
                    row.minutes_spent,
                    date_to_sql(date),
                    sprint,
                ])?;
            }
        }
        tx.commit()?;

        tracing::info!(
            total = report.total,
            valid = report.valid,
            invalid = report.invalid,
            dates = report.dates_touched,
            replaced = report.replaced,
            "worklog merge"
        );
        Ok(report)
    }

    /// Total hours logged against a task, optionally confined to one
    /// sprint window.
    pub fn task_hours(&self, task_num: &str, sprint: Option<u32>) -> Result<f64, StoreError> {
        let minutes: i64 = match sprint {
            Some(sprint) => self.conn.query_row(
                "SELECT COALESCE(SUM(minutes_spent), 0) FROM worklogs
                 WHERE task_num = ?1 AND sprint_number = ?2",
                params![task_num, sprint],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "SELECT COALESCE(SUM(minutes_spent), 0) FROM worklogs WHERE task_num = ?1",
                [task_num],
                |row| row.get(0),
            )?,
        };
        Ok(minutes as f64 / 60.0)
    }

    /// Hours and entry counts grouped by resolved sprint, unresolved
    /// dates last.
    pub fn sprint_worklog_totals(&self) -> Result<Vec<SprintWorklogTotals>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT sprint_number, COUNT(*), SUM(minutes_spent),
                    COUNT(DISTINCT owner), COUNT(DISTINCT log_date)
             FROM worklogs
             GROUP BY sprint_number
             ORDER BY sprint_number IS NULL, sprint_number",
        )?;
        let rows = stmt.query_map([], |row| {
            let minutes: i64 = row.get(2)?;
            Ok(SprintWorklogTotals {
                sprint_number: row.get(0)?,
                entries: row.get(1)?,
                total_hours: minutes as f64 / 60.0,
                owners: row.get(3)?,
                days: row.get(4)?,
            })
        })?;
        let mut totals = Vec::new();
        for total in rows {
            totals.push(total?);
        }
        Ok(totals)
    }

    /// All entries logged on one date, ordered by record id.
    pub fn worklogs_for_date(&self, date: NaiveDate) -> Result<Vec<WorklogEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT record_id, task_num, owner, minutes_spent, log_date, sprint_number
             FROM worklogs WHERE log_date = ?1 ORDER BY record_id",
        )?;
        let rows = stmt.query_map([date_to_sql(date)], |row| {
            let log_date: String = row.get(4)?;
            Ok(WorklogEntry {
                record_id: row.get(0)?,
                task_num: row.get(1)?,
                owner: row.get(2)?,
                minutes_spent: row.get(3)?,
                log_date: date_from_sql(&log_date).unwrap_or(date),
                sprint_number: row.get(5)?,
            })
        })?;
        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }
        Ok(entries)
    }

    /// All entries for a task, oldest first.
    pub fn task_worklogs(&self, task_num: &str) -> Result<Vec<WorklogEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT record_id, task_num, owner, minutes_spent, log_date, sprint_number
             FROM worklogs WHERE task_num = ?1 ORDER BY log_date, record_id",
        )?;
        let rows = stmt.query_map([task_num], |row| {
            let log_date: String = row.get(4)?;
            Ok(WorklogEntry {
                record_id: row.get(0)?,
                task_num: row.get(1)?,
                owner: row.get(2)?,
                minutes_spent: row.get(3)?,
                log_date: date_from_sql(&log_date).unwrap_or(NaiveDate::MIN),
                sprint_number: row.get(5)?,
            })
        })?;
        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }
        Ok(entries)
    }
}
