//! TOML config file loading, validation, and registration of monitored units.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use tempwatch_compliance::{ConfigError, MonitoredUnit};
use time::OffsetDateTime;

use crate::state::SystemState;

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub units: Vec<UnitEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnitEntry {
    pub unit_id: String,
    pub location: String,
    pub target_min: f64,
    pub target_max: f64,
    /// Last known reading when the hub starts. Defaults to the band midpoint.
    #[serde(default)]
    pub initial_temp: Option<f64>,
}

impl UnitEntry {
    pub fn to_unit(&self) -> Result<MonitoredUnit, ConfigError> {
        MonitoredUnit::new(
            self.unit_id.clone(),
            self.location.clone(),
            self.target_min,
            self.target_max,
        )
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate all config entries. Returns `Ok(())` or an error describing
    /// every violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_units(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    fn validate_units(&self, errors: &mut Vec<String>) {
        let mut seen_ids: HashSet<&str> = HashSet::new();

        for (i, u) in self.units.iter().enumerate() {
            let ctx = || {
                if u.unit_id.trim().is_empty() {
                    format!("units[{i}]")
                } else {
                    format!("unit '{}'", u.unit_id)
                }
            };

            // ── Identity ────────────────────────────────────────
            if !u.unit_id.trim().is_empty() && !seen_ids.insert(&u.unit_id) {
                errors.push(format!("{}: duplicate unit_id", ctx()));
            }

            // ── Band (id, location, bounds) ─────────────────────
            match u.to_unit() {
                Ok(_) => {}
                Err(ConfigError::EmptyId) => {
                    errors.push(format!("{}: unit_id is empty", ctx()));
                }
                Err(e) => errors.push(e.to_string()),
            }

            // ── Initial reading ─────────────────────────────────
            if let Some(t) = u.initial_temp {
                if !t.is_finite() {
                    errors.push(format!(
                        "{}: initial_temp must be a finite number, got {t}",
                        ctx()
                    ));
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Load + apply
// ---------------------------------------------------------------------------

/// Read, parse, and validate a TOML config file.
pub fn load(path: &str) -> Result<Config> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config: {path}"))?;
    parse(&contents).with_context(|| format!("invalid config: {path}"))
}

/// Parse and validate config text.
pub fn parse(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents).context("failed to parse config")?;
    config.validate()?;
    Ok(config)
}

/// Register every configured unit with a fresh state.
pub fn apply(config: &Config, state: &mut SystemState, now: OffsetDateTime) -> Result<()> {
    for u in &config.units {
        let unit = u
            .to_unit()
            .with_context(|| format!("failed to build unit '{}'", u.unit_id))?;
        let initial_temp = u.initial_temp.unwrap_or_else(|| unit.midpoint());
        state
            .register_unit(unit, initial_temp, now)
            .with_context(|| format!("failed to register unit '{}'", u.unit_id))?;
    }

    tracing::info!(units = config.units.len(), "config applied");

    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
