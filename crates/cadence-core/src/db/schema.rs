//! Canonical SQLite schema for the cadence store.
//!
//! The schema keeps the field-ownership split structural:
//! - `tasks` holds only external-owned columns plus the immutable
//!   computed `origin_sprint`
//! - `task_annotations` holds the dashboard-owned columns
//! - `task_sprints` is the membership edge table (never a delimited
//!   string column)
//! - `sprint_calendar` is append-only history
//! - `worklogs` is keyed by the source system's record id
//! - `store_meta` tracks the schema version mirror

/// Migration v1: full store.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS tickets (
    ticket_num TEXT PRIMARY KEY,
    ticket_status TEXT,
    subject TEXT,
    customer_name TEXT,
    section TEXT,
    ticket_created_dt TEXT,
    ticket_resolved_dt TEXT
);

CREATE TABLE IF NOT EXISTS tasks (
    task_num TEXT PRIMARY KEY,
    ticket_num TEXT NOT NULL,
    status TEXT,
    ticket_status TEXT,
    assigned_to TEXT,
    subject TEXT NOT NULL DEFAULT '',
    section TEXT,
    customer_name TEXT,
    ticket_type TEXT NOT NULL DEFAULT 'NC'
        CHECK (ticket_type IN ('IR', 'SR', 'PR', 'AD', 'NC')),
    task_created_dt TEXT,
    task_assigned_dt TEXT,
    task_resolved_dt TEXT,
    ticket_created_dt TEXT,
    ticket_resolved_dt TEXT,
    origin_sprint INTEGER,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS task_annotations (
    task_num TEXT PRIMARY KEY REFERENCES tasks(task_num) ON DELETE CASCADE,
    customer_priority INTEGER CHECK (customer_priority IS NULL OR customer_priority BETWEEN 0 AND 5),
    final_priority INTEGER CHECK (final_priority IS NULL OR final_priority BETWEEN 0 AND 5),
    goal_type TEXT CHECK (goal_type IS NULL OR goal_type IN ('Mandatory', 'Stretch')),
    hours_estimated REAL CHECK (hours_estimated IS NULL OR hours_estimated >= 0),
    dependency_on TEXT,
    dependencies_lead TEXT,
    dependency_secured TEXT,
    comments TEXT,
    non_completion_reason TEXT,
    status_update_dt TEXT
);

CREATE TABLE IF NOT EXISTS task_sprints (
    task_num TEXT NOT NULL REFERENCES tasks(task_num) ON DELETE CASCADE,
    sprint_number INTEGER NOT NULL,
    PRIMARY KEY (task_num, sprint_number)
);

CREATE TABLE IF NOT EXISTS sprint_calendar (
    sprint_number INTEGER PRIMARY KEY,
    sprint_name TEXT NOT NULL,
    sprint_start_dt TEXT NOT NULL,
    sprint_end_dt TEXT NOT NULL,
    CHECK (sprint_end_dt > sprint_start_dt)
);

CREATE TABLE IF NOT EXISTS worklogs (
    record_id TEXT PRIMARY KEY,
    task_num TEXT NOT NULL,
    owner TEXT NOT NULL DEFAULT '',
    minutes_spent INTEGER NOT NULL DEFAULT 0 CHECK (minutes_spent >= 0),
    log_date TEXT NOT NULL,
    sprint_number INTEGER,
    imported_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 0);

CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
CREATE INDEX IF NOT EXISTS idx_tasks_assigned_to ON tasks(assigned_to);
CREATE INDEX IF NOT EXISTS idx_task_sprints_sprint ON task_sprints(sprint_number);
CREATE INDEX IF NOT EXISTS idx_worklogs_log_date ON worklogs(log_date);
CREATE INDEX IF NOT EXISTS idx_worklogs_task ON worklogs(task_num);
";

/// Index names the migration must produce, asserted by tests.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_tasks_status",
    "idx_tasks_assigned_to",
    "idx_task_sprints_sprint",
    "idx_worklogs_log_date",
    "idx_worklogs_task",
];
