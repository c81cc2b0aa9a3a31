use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One activity log line from the external tracker's worklog export.
///
/// `record_id` is the de-duplication key: within an import batch a
/// repeated id overwrites the earlier row rather than duplicating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorklogEntry {
    pub record_id: String,
    pub task_num: String,
    pub owner: String,
    pub minutes_spent: u32,
    pub log_date: NaiveDate,
    /// Sprint whose window contained `log_date` at merge time, if any.
    pub sprint_number: Option<u32>,
}

impl WorklogEntry {
    /// Minutes expressed as fractional hours.
    #[must_use]
    pub fn hours(&self) -> f64 {
        f64::from(self.minutes_spent) / 60.0
    }
}
