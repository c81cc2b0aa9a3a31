use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One sprint window from the append-only calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprint {
    pub number: u32,
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Sprint {
    /// Whether `date` falls within `[start, end]`, end inclusive.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Classify this sprint relative to `today`.
    #[must_use]
    pub fn phase_on(&self, today: NaiveDate) -> SprintPhase {
        if self.end < today {
            SprintPhase::Past
        } else if self.start > today {
            SprintPhase::Upcoming
        } else {
            SprintPhase::Current
        }
    }
}

impl fmt::Display for Sprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sprint {}: {} ({} to {})",
            self.number, self.name, self.start, self.end
        )
    }
}

/// Where a sprint sits relative to a reference date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SprintPhase {
    Past,
    Current,
    Upcoming,
}

/// The set of sprint numbers a task is assigned to.
///
/// Grown and shrunk only through `insert`/`remove`; there is
/// deliberately no bulk-replace operation. An empty set means the task
/// sits in the unassigned backlog (status permitting).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct SprintSet(BTreeSet<u32>);

impl SprintSet {
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Add a sprint number. Returns false if it was already present.
    pub fn insert(&mut self, sprint_number: u32) -> bool {
        self.0.insert(sprint_number)
    }

    /// Remove exactly one sprint number. Returns false if absent.
    pub fn remove(&mut self, sprint_number: u32) -> bool {
        self.0.remove(&sprint_number)
    }

    #[must_use]
    pub fn contains(&self, sprint_number: u32) -> bool {
        self.0.contains(&sprint_number)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Sprint numbers in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<u32> for SprintSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for SprintSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for n in &self.0 {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{n}")?;
            first = false;
        }
        Ok(())
    }
}
