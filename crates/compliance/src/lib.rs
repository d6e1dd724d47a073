//! Temperature compliance rules for refrigeration units.
//!
//! [`evaluate`] takes a unit's configured band, its previous [`UnitState`] and
//! a new reading, and returns the next state together with any [`Alert`]s the
//! reading raises. It does no I/O and keeps no state of its own; callers own
//! the per-unit state and must serialise evaluations for a given unit.

mod errors;
mod evaluator;
mod model;
pub mod schedule;

pub use errors::{parse_reading, validate_reading, ConfigError, InputError};
pub use evaluator::{
    band_rule, evaluate, seed, Evaluation, Rule, CRITICAL_MARGIN_F, SAFETY_LIMIT_F,
    WARNING_MARGIN_F,
};
pub use model::{
    Alert, AlertKind, CheckInterval, MonitoredUnit, Severity, Status, Trend, UnitState,
};
pub use schedule::next_check;
