use std::fmt;

use chrono::NaiveDateTime;

/// Machine-readable error codes surfaced alongside human-readable messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InvalidThreshold,
    CalendarOverlap,
    CalendarInvalidWindow,
    DuplicateSprintNumber,
    TaskNotFound,
    SprintNotFound,
    AlreadyAssigned,
    NotAssigned,
    BeforeOriginSprint,
    StatusDateBeforeAssignment,
    InvalidStatusValue,
    PriorityOutOfRange,
    InvalidEstimate,
    StoreWriteFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::InvalidThreshold => "E1002",
            Self::CalendarOverlap => "E1003",
            Self::CalendarInvalidWindow => "E1004",
            Self::DuplicateSprintNumber => "E1005",
            Self::TaskNotFound => "E2001",
            Self::SprintNotFound => "E2002",
            Self::AlreadyAssigned => "E2003",
            Self::NotAssigned => "E2004",
            Self::BeforeOriginSprint => "E2005",
            Self::StatusDateBeforeAssignment => "E2006",
            Self::InvalidStatusValue => "E2007",
            Self::PriorityOutOfRange => "E2008",
            Self::InvalidEstimate => "E2009",
            Self::StoreWriteFailed => "E5001",
        }
    }

    /// Short human-facing summary for logs and inline display.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidThreshold => "Invalid threshold or limit in config",
            Self::CalendarOverlap => "Sprint calendar windows overlap",
            Self::CalendarInvalidWindow => "Sprint window end is not after start",
            Self::DuplicateSprintNumber => "Duplicate sprint number in calendar",
            Self::TaskNotFound => "Task not found",
            Self::SprintNotFound => "Sprint not found",
            Self::AlreadyAssigned => "Task already assigned to sprint",
            Self::NotAssigned => "Task not assigned to sprint",
            Self::BeforeOriginSprint => "Sprint precedes the task's origin sprint",
            Self::StatusDateBeforeAssignment => "Status date precedes assignment date",
            Self::InvalidStatusValue => "Invalid status value",
            Self::PriorityOutOfRange => "Priority out of range",
            Self::InvalidEstimate => "Estimated hours invalid",
            Self::StoreWriteFailed => "Store write failed",
        }
    }

    /// Optional remediation hint that can be surfaced inline to admins.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in cadence.toml and retry."),
            Self::InvalidThreshold => {
                Some("Limits must be positive and at-risk days must not exceed exceeded days.")
            }
            Self::CalendarOverlap | Self::CalendarInvalidWindow | Self::DuplicateSprintNumber => {
                Some("Correct the sprint calendar rows before loading the store.")
            }
            Self::AlreadyAssigned => Some("Remove the existing assignment first, or skip."),
            Self::BeforeOriginSprint => {
                Some("A task cannot be assigned to a sprint earlier than its origin sprint.")
            }
            Self::StatusDateBeforeAssignment => {
                Some("Pick an effective date on or after the task's assignment date.")
            }
            Self::PriorityOutOfRange => Some("Priority must be between 0 and 5."),
            Self::InvalidEstimate => Some("Estimated hours must be zero or more."),
            Self::StoreWriteFailed => Some("Check disk space and write permissions."),
            Self::TaskNotFound
            | Self::SprintNotFound
            | Self::NotAssigned
            | Self::InvalidStatusValue => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Validation failures from assignment and edit operations.
///
/// These are returned, not propagated as fatal errors: the caller is an
/// interactive surface that must render the reason inline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssignError {
    #[error("task {0} not found")]
    TaskNotFound(String),
    #[error("sprint {0} not found in calendar")]
    SprintNotFound(u32),
    #[error("task {task} already assigned to sprint {sprint}")]
    AlreadyAssigned { task: String, sprint: u32 },
    #[error("task {task} not assigned to sprint {sprint}")]
    NotAssigned { task: String, sprint: u32 },
    #[error("sprint {sprint} precedes origin sprint {origin} of task {task}")]
    BeforeOriginSprint { task: String, sprint: u32, origin: u32 },
    #[error("effective date {effective} precedes assignment date {assigned} for task {task}")]
    StatusDateBeforeAssignment {
        task: String,
        effective: NaiveDateTime,
        assigned: NaiveDateTime,
    },
    #[error("priority {0} out of range 0..=5")]
    PriorityOutOfRange(i64),
    #[error("estimate {0} is not a non-negative number of hours")]
    InvalidEstimate(f64),
}

impl AssignError {
    /// The stable machine code for this failure.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::TaskNotFound(_) => ErrorCode::TaskNotFound,
            Self::SprintNotFound(_) => ErrorCode::SprintNotFound,
            Self::AlreadyAssigned { .. } => ErrorCode::AlreadyAssigned,
            Self::NotAssigned { .. } => ErrorCode::NotAssigned,
            Self::BeforeOriginSprint { .. } => ErrorCode::BeforeOriginSprint,
            Self::StatusDateBeforeAssignment { .. } => ErrorCode::StatusDateBeforeAssignment,
            Self::PriorityOutOfRange(_) => ErrorCode::PriorityOutOfRange,
            Self::InvalidEstimate(_) => ErrorCode::InvalidEstimate,
        }
    }
}
