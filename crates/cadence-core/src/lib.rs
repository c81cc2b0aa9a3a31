//! cadence-core library.
//!
//! Import reconciliation, sprint calendar, membership sets, and the
//! SQLite-backed task store for the sprint planning dashboard.

pub mod calendar;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod store;

pub use calendar::{CalendarError, SprintCalendar};
pub use config::{CadenceConfig, TatThreshold, load_config};
pub use error::{AssignError, ErrorCode};
pub use store::{StoreError, TaskStore};
