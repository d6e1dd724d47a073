//! Compliance rules: turns a new reading into the unit's next state.
//!
//! Rules are applied in a fixed order and the last one that matches wins:
//!
//! ```text
//! distance from band   0        (0, 3]     (3, 8]       > 8
//!                      InBand   NearBand   Moderate     FarOutOfBand
//!                      Normal   Warning    Critical     Critical
//!                      Std      Std        (unchanged)  Escalated
//!
//! temp >= 50°F         SafetyOverride: Critical, Escalated, overrides all of the above
//! ```
//!
//! Only the safety override raises alerts. Every other non-normal outcome is
//! reported through the returned status alone.

use serde::Serialize;
use time::OffsetDateTime;

use crate::model::{
    Alert, AlertKind, CheckInterval, MonitoredUnit, Severity, Status, Trend, UnitState,
};
use crate::schedule::{next_check, ESCALATED_INTERVAL_MIN};

/// Readings within this many degrees outside the band are a warning.
pub const WARNING_MARGIN_F: f64 = 3.0;

/// Readings more than this many degrees outside the band escalate checks.
pub const CRITICAL_MARGIN_F: f64 = 8.0;

/// Absolute limit for any unit, whatever its band.
pub const SAFETY_LIMIT_F: f64 = 50.0;

/// Which classification rule decided the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    InBand,
    NearBand,
    FarOutOfBand,
    ModeratelyOutOfBand,
    SafetyOverride,
}

/// Result of one reading: the replacement state and any alerts to deliver.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub state: UnitState,
    pub alerts: Vec<Alert>,
    pub rule: Rule,
}

struct Outcome {
    status: Status,
    interval: CheckInterval,
    consecutive: u32,
    rule: Rule,
}

/// Band rule for `temp`, ignoring the safety override.
pub fn band_rule(unit: &MonitoredUnit, temp: f64) -> Rule {
    let distance = unit.distance(temp);
    if unit.contains(temp) {
        Rule::InBand
    } else if distance <= WARNING_MARGIN_F {
        Rule::NearBand
    } else if distance > CRITICAL_MARGIN_F {
        Rule::FarOutOfBand
    } else {
        Rule::ModeratelyOutOfBand
    }
}

/// Evaluate `new_temp` for `unit` against its `prior` state.
///
/// Total over finite readings and never blocks. Callers must serialise calls
/// per unit: the result is only meaningful when `prior` is the latest state.
pub fn evaluate(
    unit: &MonitoredUnit,
    prior: &UnitState,
    new_temp: f64,
    now: OffsetDateTime,
) -> Evaluation {
    let mut outcome = match band_rule(unit, new_temp) {
        Rule::InBand => Outcome {
            status: Status::Normal,
            interval: CheckInterval::Standard,
            consecutive: 0,
            rule: Rule::InBand,
        },
        Rule::NearBand => Outcome {
            status: Status::Warning,
            interval: CheckInterval::Standard,
            consecutive: 0,
            rule: Rule::NearBand,
        },
        Rule::FarOutOfBand => {
            // Counts against this unit's band, not the absolute limit.
            let consecutive = if unit.is_out_of_band(prior.current_temp) {
                prior.consecutive_high_readings.saturating_add(1)
            } else {
                1
            };
            Outcome {
                status: Status::Critical,
                interval: CheckInterval::Escalated,
                consecutive,
                rule: Rule::FarOutOfBand,
            }
        }
        // band_rule never yields SafetyOverride; what is left is the (3, 8] gap.
        rule => Outcome {
            status: Status::Critical,
            interval: prior.check_interval,
            consecutive: 0,
            rule,
        },
    };

    if new_temp >= SAFETY_LIMIT_F {
        let consecutive = if prior.current_temp >= SAFETY_LIMIT_F {
            prior.consecutive_high_readings.saturating_add(1)
        } else {
            1
        };
        outcome = Outcome {
            status: Status::Critical,
            interval: CheckInterval::Escalated,
            consecutive,
            rule: Rule::SafetyOverride,
        };
    }

    let alerts = match outcome.rule {
        Rule::SafetyOverride => vec![safety_alert(unit, new_temp, outcome.consecutive, now)],
        _ => Vec::new(),
    };

    let state = UnitState {
        current_temp: new_temp,
        status: outcome.status,
        trend: Trend::between(prior.current_temp, new_temp),
        check_interval: outcome.interval,
        consecutive_high_readings: outcome.consecutive,
        last_checked: now,
        next_check_due: next_check(now, outcome.interval),
    };

    Evaluation {
        state,
        alerts,
        rule: outcome.rule,
    }
}

/// Starting state for a newly configured unit.
///
/// `initial_temp` is classified like a reading with nothing before it, so an
/// out-of-band seed shows its real status and a seed at or above the safety
/// limit already counts as the first hot reading. No alerts are raised.
pub fn seed(unit: &MonitoredUnit, initial_temp: f64, now: OffsetDateTime) -> UnitState {
    evaluate(unit, &UnitState::new(initial_temp, now), initial_temp, now).state
}

fn safety_alert(unit: &MonitoredUnit, temp: f64, consecutive: u32, now: OffsetDateTime) -> Alert {
    let (kind, message) = if consecutive >= 2 {
        (
            AlertKind::MoveStock,
            format!(
                "{} read {temp:.1}°F, {consecutive} consecutive readings at or above \
                 {SAFETY_LIMIT_F}°F. Move stock to backup storage immediately.",
                unit.location()
            ),
        )
    } else {
        (
            AlertKind::IntervalShortened,
            format!(
                "{} read {temp:.1}°F, at or above {SAFETY_LIMIT_F}°F. Recheck interval \
                 shortened to {ESCALATED_INTERVAL_MIN} minutes.",
                unit.location()
            ),
        )
    };

    Alert {
        unit_id: unit.id().to_string(),
        severity: Severity::Critical,
        kind,
        message,
        timestamp: now,
    }
}

// ===========================================================================
// Tests
// ===========================================================================
