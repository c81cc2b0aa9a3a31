use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::sprint::SprintSet;

/// Ticket classification derived from the subject line at import time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketType {
    /// Incident request.
    Ir,
    /// Service request.
    Sr,
    /// Project request.
    Pr,
    /// Admin request.
    Ad,
    /// Not classified.
    Nc,
}

impl TicketType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ir => "IR",
            Self::Sr => "SR",
            Self::Pr => "PR",
            Self::Ad => "AD",
            Self::Nc => "NC",
        }
    }

    /// Classify a subject line by its ticket-type markers.
    ///
    /// Markers match the external system's subject conventions
    /// (`LAB-IR ...`, `...-SR: ...`, etc.); unmatched subjects are `Nc`.
    #[must_use]
    pub fn from_subject(subject: &str) -> Self {
        let upper = subject.to_ascii_uppercase();
        if upper.contains("LAB-IR") || upper.contains("-IR:") || upper.contains("LAB INCIDENT") {
            Self::Ir
        } else if upper.contains("LAB-SR") || upper.contains("-SR:") {
            Self::Sr
        } else if upper.contains("LAB-PR") || upper.contains("-PR:") {
            Self::Pr
        } else if upper.contains("LAB-AD") || upper.contains("-AD:") {
            Self::Ad
        } else {
            Self::Nc
        }
    }
}

/// Task lifecycle status as reported by the external tracker.
///
/// The open and closed sets are mutually exclusive and exhaustive:
/// every status is exactly one of the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Logged,
    Assigned,
    Accepted,
    Waiting,
    Completed,
    Closed,
    Resolved,
    Done,
    Canceled,
    #[serde(rename = "Excluded from Carryover")]
    ExcludedFromCarryover,
}

impl TaskStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Logged => "Logged",
            Self::Assigned => "Assigned",
            Self::Accepted => "Accepted",
            Self::Waiting => "Waiting",
            Self::Completed => "Completed",
            Self::Closed => "Closed",
            Self::Resolved => "Resolved",
            Self::Done => "Done",
            Self::Canceled => "Canceled",
            Self::ExcludedFromCarryover => "Excluded from Carryover",
        }
    }

    /// Whether the task is still in flight (backlog-eligible).
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(
            self,
            Self::Logged | Self::Assigned | Self::Accepted | Self::Waiting
        )
    }

    /// Whether the task has reached a terminal status.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        !self.is_open()
    }
}

/// Goal classification for capacity planning. Absence means untagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoalType {
    Mandatory,
    Stretch,
}

impl GoalType {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Mandatory => "Mandatory",
            Self::Stretch => "Stretch",
        }
    }
}

/// Priority level 0 (none) through 5 (critical).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Priority(u8);

impl Priority {
    pub const MAX: Self = Self(5);

    /// Construct a priority, rejecting values outside `0..=5`.
    pub fn new(value: i64) -> Result<Self, i64> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= 5)
            .map(Self)
            .ok_or(value)
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

/// Origin label for a task viewed within one sprint's context.
///
/// Derived from the immutable origin sprint versus the sprint being
/// viewed. Informational only; no view filters on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOrigin {
    /// The task's origin sprint is the sprint being viewed.
    CreatedHere,
    /// The task originated in another sprint (or before the calendar).
    BroughtIn,
}

/// Fields owned by the external tracker. Overwritten on every import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExternalFields {
    pub ticket_num: String,
    pub status: Option<TaskStatus>,
    pub ticket_status: Option<String>,
    pub assigned_to: Option<String>,
    pub subject: String,
    pub section: Option<String>,
    pub customer_name: Option<String>,
    pub task_created: Option<NaiveDateTime>,
    pub task_assigned: Option<NaiveDateTime>,
    pub task_resolved: Option<NaiveDateTime>,
    pub ticket_created: Option<NaiveDateTime>,
    pub ticket_resolved: Option<NaiveDateTime>,
}

/// Fields owned by the dashboard. Never touched by imports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Annotations {
    pub customer_priority: Option<Priority>,
    pub final_priority: Option<Priority>,
    pub goal_type: Option<GoalType>,
    pub hours_estimated: Option<f64>,
    pub dependency_on: Option<String>,
    pub dependencies_lead: Option<String>,
    pub dependency_secured: Option<String>,
    pub comments: Option<String>,
    pub non_completion_reason: Option<String>,
    pub status_update_dt: Option<NaiveDateTime>,
}

/// A unit of work under a ticket. `task_num` is the unique key.
///
/// The split into `external` and `annotations` is the field-ownership
/// model: the reconciler writes only `external`, dashboard edits write
/// only `annotations` and `sprints`. `ticket_type` and `origin_sprint`
/// are computed once at first sighting and never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_num: String,
    pub external: ExternalFields,
    pub annotations: Annotations,
    pub ticket_type: TicketType,
    /// Sprint whose window contained the assignment date at creation
    /// time. Immutable once set; `None` when the date fell in a gap.
    pub origin_sprint: Option<u32>,
    pub sprints: SprintSet,
}

impl Task {
    /// Age in fractional days as of `as_of`, clamped at zero.
    ///
    /// Anchor is the task *assignment* date, falling back to the task
    /// creation date when never assigned. Tasks with neither date read
    /// as zero days old.
    #[must_use]
    pub fn days_open(&self, as_of: NaiveDateTime) -> f64 {
        let anchor = self.external.task_assigned.or(self.external.task_created);
        let Some(anchor) = anchor else { return 0.0 };
        let seconds = (as_of - anchor).num_seconds();
        if seconds <= 0 {
            0.0
        } else {
            seconds as f64 / 86_400.0
        }
    }

    /// Whether the task appears in the backlog view: open status,
    /// irrespective of sprint membership.
    #[must_use]
    pub fn in_backlog(&self) -> bool {
        self.external.status.is_some_and(TaskStatus::is_open)
    }

    /// Origin label relative to the sprint being viewed.
    #[must_use]
    pub fn origin_in(&self, sprint_number: u32) -> TaskOrigin {
        if self.origin_sprint == Some(sprint_number) {
            TaskOrigin::CreatedHere
        } else {
            TaskOrigin::BroughtIn
        }
    }

    /// The priority a view should display: admin override first, then
    /// the customer-set value.
    #[must_use]
    pub fn effective_priority(&self) -> Option<Priority> {
        self.annotations
            .final_priority
            .or(self.annotations.customer_priority)
    }
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl ParseEnumError {
    /// The stable machine code for an unparseable enum value.
    #[must_use]
    pub const fn error_code(&self) -> crate::error::ErrorCode {
        crate::error::ErrorCode::InvalidStatusValue
    }
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for GoalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase()
}

impl FromStr for TicketType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "ir" => Ok(Self::Ir),
            "sr" => Ok(Self::Sr),
            "pr" => Ok(Self::Pr),
            "ad" => Ok(Self::Ad),
            "nc" => Ok(Self::Nc),
            _ => Err(ParseEnumError {
                expected: "ticket type",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "logged" => Ok(Self::Logged),
            "assigned" => Ok(Self::Assigned),
            "accepted" => Ok(Self::Accepted),
            "waiting" => Ok(Self::Waiting),
            "completed" => Ok(Self::Completed),
            "closed" => Ok(Self::Closed),
            "resolved" => Ok(Self::Resolved),
            "done" => Ok(Self::Done),
            // Both spellings appear in historical extracts.
            "canceled" | "cancelled" => Ok(Self::Canceled),
            "excluded from carryover" => Ok(Self::ExcludedFromCarryover),
            _ => Err(ParseEnumError {
                expected: "task status",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for GoalType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "mandatory" => Ok(Self::Mandatory),
            "stretch" => Ok(Self::Stretch),
            _ => Err(ParseEnumError {
                expected: "goal type",
                got: s.to_string(),
            }),
        }
    }
}
