#![forbid(unsafe_code)]
//! cadence-metrics library.
//!
//! Pure read-side aggregations over task data from `cadence-core`:
//! per-assignee capacity loads and turnaround-time signals. Nothing
//! here writes to the store.

pub mod capacity;
pub mod tat;

pub use capacity::{AssigneeCapacity, CapacityBand, band, sprint_capacity};
pub use tat::{SprintTatSummary, TatSignal, TypeTatCounts, evaluate, is_recurring, sprint_tat_summary};
