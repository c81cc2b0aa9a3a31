//! Sprint calendar: maps dates to sprint windows.
//!
//! The calendar is append-only history. Construction validates the
//! whole table once; gaps between windows are legal and a date falling
//! in a gap is a normal `None`, not an error.

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{Sprint, SprintPhase};

/// Fatal calendar problems caught at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("sprint {number}: end {end} is not after start {start}")]
    InvalidWindow {
        number: u32,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error("sprint {second} starts {second_start}, inside sprint {first}'s window ending {first_end}")]
    Overlap {
        first: u32,
        first_end: NaiveDate,
        second: u32,
        second_start: NaiveDate,
    },
    #[error("sprint number {0} appears more than once")]
    DuplicateNumber(u32),
}

/// Ordered, validated set of sprint windows.
#[derive(Debug, Clone)]
pub struct SprintCalendar {
    // Sorted by start date; validated non-overlapping.
    sprints: Vec<Sprint>,
}

impl SprintCalendar {
    /// Build a calendar from unordered rows, validating window order,
    /// overlap, and number uniqueness.
    pub fn new(mut sprints: Vec<Sprint>) -> Result<Self, CalendarError> {
        sprints.sort_by_key(|s| s.start);

        for sprint in &sprints {
            if sprint.end <= sprint.start {
                return Err(CalendarError::InvalidWindow {
                    number: sprint.number,
                    start: sprint.start,
                    end: sprint.end,
                });
            }
        }

        for pair in sprints.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if b.start <= a.end {
                return Err(CalendarError::Overlap {
                    first: a.number,
                    first_end: a.end,
                    second: b.number,
                    second_start: b.start,
                });
            }
        }

        let mut numbers: Vec<u32> = sprints.iter().map(|s| s.number).collect();
        numbers.sort_unstable();
        if let Some(dup) = numbers.windows(2).find(|w| w[0] == w[1]) {
            return Err(CalendarError::DuplicateNumber(dup[0]));
        }

        Ok(Self { sprints })
    }

    /// All sprints, ordered by start date.
    #[must_use]
    pub fn sprints(&self) -> &[Sprint] {
        &self.sprints
    }

    /// The sprint whose window contains `date`, if any.
    #[must_use]
    pub fn sprint_for_date(&self, date: NaiveDate) -> Option<&Sprint> {
        self.sprints.iter().find(|s| s.contains(date))
    }

    /// Look up a sprint by its number.
    #[must_use]
    pub fn by_number(&self, number: u32) -> Option<&Sprint> {
        self.sprints.iter().find(|s| s.number == number)
    }

    /// Classify a sprint relative to `today`; `None` for unknown numbers.
    #[must_use]
    pub fn phase_of(&self, number: u32, today: NaiveDate) -> Option<SprintPhase> {
        self.by_number(number).map(|s| s.phase_on(today))
    }

    /// The sprint whose window contains `today`.
    #[must_use]
    pub fn current(&self, today: NaiveDate) -> Option<&Sprint> {
        self.sprint_for_date(today)
    }

    /// The first sprint starting strictly after `today`.
    #[must_use]
    pub fn next_after(&self, today: NaiveDate) -> Option<&Sprint> {
        self.sprints.iter().find(|s| s.start > today)
    }

    /// The current sprint if one is active, otherwise the next upcoming.
    #[must_use]
    pub fn active_or_next(&self, today: NaiveDate) -> Option<&Sprint> {
        self.current(today).or_else(|| self.next_after(today))
    }
}
