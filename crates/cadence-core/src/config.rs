//! Configuration: sprint schedule, capacity limits, TAT thresholds,
//! recurring-activity exclusions, and the import date filter.
//!
//! Loaded once from TOML; every section has defaults so a missing file
//! yields a fully usable config. `validate` makes malformed thresholds
//! fatal at startup rather than a per-operation surprise.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::model::TicketType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadenceConfig {
    #[serde(default)]
    pub sprint_schedule: SprintScheduleConfig,
    #[serde(default)]
    pub capacity: CapacityConfig,
    #[serde(default = "default_tat")]
    pub tat: BTreeMap<String, TatThreshold>,
    #[serde(default)]
    pub recurring: RecurringConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            sprint_schedule: SprintScheduleConfig::default(),
            capacity: CapacityConfig::default(),
            tat: default_tat(),
            recurring: RecurringConfig::default(),
            import: ImportConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SprintScheduleConfig {
    #[serde(default = "default_duration_days")]
    pub duration_days: u32,
    /// Weekday sprints start on, 0 = Monday (3 = Thursday).
    #[serde(default = "default_start_weekday")]
    pub start_weekday: u32,
}

impl Default for SprintScheduleConfig {
    fn default() -> Self {
        Self {
            duration_days: default_duration_days(),
            start_weekday: default_start_weekday(),
        }
    }
}

/// Per-person hour caps for one sprint, split by goal type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityConfig {
    #[serde(default = "default_mandatory_hours")]
    pub mandatory_hours: f64,
    #[serde(default = "default_stretch_hours")]
    pub stretch_hours: f64,
    #[serde(default = "default_total_hours")]
    pub total_hours: f64,
    /// Percent of each limit at which the warning band begins.
    #[serde(default = "default_warning_percent")]
    pub warning_percent: u8,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            mandatory_hours: default_mandatory_hours(),
            stretch_hours: default_stretch_hours(),
            total_hours: default_total_hours(),
            warning_percent: default_warning_percent(),
        }
    }
}

/// TAT day thresholds for one ticket type. Fractional days are valid
/// (incidents turn around in under a day).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TatThreshold {
    pub at_risk_days: f64,
    pub exceeded_days: f64,
    /// Whether crossing `exceeded_days` forces priority to maximum.
    #[serde(default)]
    pub escalate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringConfig {
    /// Case-insensitive subject keywords marking standing activities
    /// that are exempt from all TAT evaluation.
    #[serde(default = "default_recurring_keywords")]
    pub subject_keywords: Vec<String>,
}

impl Default for RecurringConfig {
    fn default() -> Self {
        Self {
            subject_keywords: default_recurring_keywords(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ImportConfig {
    /// Rows created before this date are imported only when their
    /// status is open. `None` disables the filter.
    #[serde(default)]
    pub threshold_date: Option<NaiveDate>,
}

fn default_duration_days() -> u32 {
    14
}

fn default_start_weekday() -> u32 {
    3
}

fn default_mandatory_hours() -> f64 {
    48.0
}

fn default_stretch_hours() -> f64 {
    16.0
}

fn default_total_hours() -> f64 {
    80.0
}

fn default_warning_percent() -> u8 {
    85
}

fn default_recurring_keywords() -> Vec<String> {
    vec![
        "Standing Meeting".to_string(),
        "Miscellaneous Meetings".to_string(),
    ]
}

fn default_tat() -> BTreeMap<String, TatThreshold> {
    let mut map = BTreeMap::new();
    map.insert(
        "ir".to_string(),
        TatThreshold {
            at_risk_days: 0.6,
            exceeded_days: 0.8,
            escalate: true,
        },
    );
    map.insert(
        "sr".to_string(),
        TatThreshold {
            at_risk_days: 18.0,
            exceeded_days: 22.0,
            escalate: true,
        },
    );
    map
}

impl CadenceConfig {
    /// The TAT thresholds for one ticket type, if configured.
    ///
    /// Types without an entry are monitored but never flagged.
    #[must_use]
    pub fn tat_for(&self, ticket_type: TicketType) -> Option<TatThreshold> {
        let key = match ticket_type {
            TicketType::Ir => "ir",
            TicketType::Sr => "sr",
            TicketType::Pr => "pr",
            TicketType::Ad => "ad",
            TicketType::Nc => "nc",
        };
        self.tat.get(key).copied()
    }

    /// Fatal startup validation of limits and thresholds.
    pub fn validate(&self) -> Result<()> {
        if self.sprint_schedule.duration_days == 0 {
            bail!("sprint_schedule.duration_days must be positive");
        }
        if self.sprint_schedule.start_weekday > 6 {
            bail!("sprint_schedule.start_weekday must be 0..=6");
        }
        for (name, hours) in [
            ("capacity.mandatory_hours", self.capacity.mandatory_hours),
            ("capacity.stretch_hours", self.capacity.stretch_hours),
            ("capacity.total_hours", self.capacity.total_hours),
        ] {
            if !hours.is_finite() || hours <= 0.0 {
                bail!("{name} must be a positive number, got {hours}");
            }
        }
        if self.capacity.warning_percent == 0 || self.capacity.warning_percent > 100 {
            bail!(
                "capacity.warning_percent must be 1..=100, got {}",
                self.capacity.warning_percent
            );
        }
        for (key, tat) in &self.tat {
            if !tat.at_risk_days.is_finite()
                || !tat.exceeded_days.is_finite()
                || tat.at_risk_days < 0.0
                || tat.exceeded_days <= 0.0
            {
                bail!("tat.{key}: day thresholds must be non-negative numbers");
            }
            if tat.at_risk_days > tat.exceeded_days {
                bail!(
                    "tat.{key}: at_risk_days ({}) exceeds exceeded_days ({})",
                    tat.at_risk_days,
                    tat.exceeded_days
                );
            }
        }
        Ok(())
    }
}

/// Load and validate config from a TOML file. A missing file yields
/// the defaults; a malformed file or bad values are fatal.
pub fn load_config(path: &Path) -> Result<CadenceConfig> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str::<CadenceConfig>(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?
    } else {
        CadenceConfig::default()
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::{CadenceConfig, TatThreshold};
    use crate::model::TicketType;

    #[test]
    fn defaults_validate_and_cover_ir_sr() {
        let config = CadenceConfig::default();
        config.validate().expect("defaults valid");

        let ir = config.tat_for(TicketType::Ir).expect("ir thresholds");
        assert!((ir.exceeded_days - 0.8).abs() < f64::EPSILON);
        assert!(ir.escalate);

        let sr = config.tat_for(TicketType::Sr).expect("sr thresholds");
        assert!((sr.at_risk_days - 18.0).abs() < f64::EPSILON);
        assert!(config.tat_for(TicketType::Pr).is_none());
    }

    #[test]
    fn parse_overrides_defaults() {
        let config: CadenceConfig = toml::from_str(
            r#"
            [capacity]
            mandatory_hours = 40.0

            [tat.pr]
            at_risk_days = 30.0
            exceeded_days = 45.0
            "#,
        )
        .expect("parse");
        assert!((config.capacity.mandatory_hours - 40.0).abs() < f64::EPSILON);
        assert!((config.capacity.stretch_hours - 16.0).abs() < f64::EPSILON);
        let pr = config.tat_for(TicketType::Pr).expect("pr thresholds");
        assert!(!pr.escalate);
    }

    #[test]
    fn inverted_tat_thresholds_are_fatal() {
        let mut config = CadenceConfig::default();
        config.tat.insert(
            "sr".to_string(),
            TatThreshold {
                at_risk_days: 30.0,
                exceeded_days: 22.0,
                escalate: true,
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_capacity_is_fatal() {
        let mut config = CadenceConfig::default();
        config.capacity.total_hours = 0.0;
        assert!(config.validate().is_err());
    }
}
