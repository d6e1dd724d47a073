//! Units, their evolving state, and the alerts raised about them.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::errors::ConfigError;
use crate::schedule::next_check;

// ---------------------------------------------------------------------------
// Unit configuration
// ---------------------------------------------------------------------------

/// A refrigeration or freezer asset and its safe band in °F.
///
/// Only constructible through [`MonitoredUnit::new`], so every value in
/// circulation satisfies `target_min < target_max`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoredUnit {
    id: String,
    location: String,
    target_min: f64,
    target_max: f64,
}

impl MonitoredUnit {
    pub fn new(
        id: impl Into<String>,
        location: impl Into<String>,
        target_min: f64,
        target_max: f64,
    ) -> Result<Self, ConfigError> {
        let id = id.into();
        let location = location.into();

        if id.trim().is_empty() {
            return Err(ConfigError::EmptyId);
        }
        if location.trim().is_empty() {
            return Err(ConfigError::EmptyLocation { id });
        }
        if !target_min.is_finite() || !target_max.is_finite() {
            return Err(ConfigError::NonFiniteBound { id });
        }
        if target_min >= target_max {
            return Err(ConfigError::InvalidBand {
                id,
                min: target_min,
                max: target_max,
            });
        }

        Ok(Self {
            id,
            location,
            target_min,
            target_max,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn target_min(&self) -> f64 {
        self.target_min
    }

    pub fn target_max(&self) -> f64 {
        self.target_max
    }

    pub fn midpoint(&self) -> f64 {
        self.target_min + (self.target_max - self.target_min) / 2.0
    }

    /// True when `temp` lies inside the band, bounds included.
    pub fn contains(&self, temp: f64) -> bool {
        (self.target_min..=self.target_max).contains(&temp)
    }

    pub fn is_out_of_band(&self, temp: f64) -> bool {
        !self.contains(temp)
    }

    /// Degrees between `temp` and the nearest bound; zero inside the band.
    pub fn distance(&self, temp: f64) -> f64 {
        if temp < self.target_min {
            self.target_min - temp
        } else if temp > self.target_max {
            temp - self.target_max
        } else {
            0.0
        }
    }
}

// ---------------------------------------------------------------------------
// Classification enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Normal,
    Warning,
    Critical,
}

impl Status {
    /// Operator-facing line shown next to a non-normal unit.
    pub fn advisory(self) -> Option<&'static str> {
        match self {
            Status::Normal => None,
            Status::Warning => {
                Some("WARNING: Temperature trending outside normal range. Monitor closely.")
            }
            Status::Critical => {
                Some("CRITICAL: Temperature outside safe range! Check equipment immediately.")
            }
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Stable,
    Rising,
    Falling,
}

impl Trend {
    pub fn between(previous: f64, current: f64) -> Self {
        if current > previous {
            Trend::Rising
        } else if current < previous {
            Trend::Falling
        } else {
            Trend::Stable
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::Rising => write!(f, "rising"),
            Self::Falling => write!(f, "falling"),
        }
    }
}

/// Polling cadence for manual checks. See [`crate::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckInterval {
    Standard,
    Escalated,
}

impl fmt::Display for CheckInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Escalated => write!(f, "escalated"),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-unit state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitState {
    pub current_temp: f64,
    pub status: Status,
    pub trend: Trend,
    pub check_interval: CheckInterval,
    pub consecutive_high_readings: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub last_checked: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub next_check_due: OffsetDateTime,
}

impl UnitState {
    /// Default in-band state. Configured units start from [`crate::seed`],
    /// which classifies the initial temperature.
    pub fn new(initial_temp: f64, now: OffsetDateTime) -> Self {
        Self {
            current_temp: initial_temp,
            status: Status::Normal,
            trend: Trend::Stable,
            check_interval: CheckInterval::Standard,
            consecutive_high_readings: 0,
            last_checked: now,
            next_check_due: next_check(now, CheckInterval::Standard),
        }
    }

    pub fn is_overdue(&self, now: OffsetDateTime) -> bool {
        self.next_check_due < now
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// First reading at or above the safety limit; checks now every 20 min.
    IntervalShortened,
    /// Repeated readings at or above the safety limit.
    MoveStock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub unit_id: String,
    pub severity: Severity,
    pub kind: AlertKind,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}
