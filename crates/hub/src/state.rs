use anyhow::{bail, Result};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tempwatch_compliance::{evaluate, seed, Alert, Evaluation, MonitoredUnit, Severity, UnitState};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Maximum number of events retained in the ring buffer.
const MAX_EVENTS: usize = 200;

// ---------------------------------------------------------------------------
// Public type alias
// ---------------------------------------------------------------------------

/// Evaluations take the write half, so readings for a unit are applied one
/// at a time against its latest state.
pub type SharedState = Arc<RwLock<SystemState>>;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

pub struct SystemState {
    pub started_at: Instant,
    pub units: BTreeMap<String, UnitRecord>,
    pub events: VecDeque<SystemEvent>,
}

pub struct UnitRecord {
    pub unit: MonitoredUnit,
    pub state: UnitState,
    /// Set once the current deadline has been reported as missed.
    overdue_reported: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct SystemEvent {
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    pub detail: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Reading,
    Alert,
    Overdue,
    Error,
    System,
}

// ---------------------------------------------------------------------------
// JSON response (what the API returns)
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct UnitView {
    pub unit_id: String,
    pub location: String,
    pub target_min: f64,
    pub target_max: f64,
    #[serde(flatten)]
    pub state: UnitState,
    pub advisory: Option<&'static str>,
    pub overdue: bool,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub uptime_secs: u64,
    pub units: Vec<UnitView>,
    pub events: Vec<SystemEvent>,
}

// ---------------------------------------------------------------------------
// Construction & mutation
// ---------------------------------------------------------------------------

impl SystemState {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            units: BTreeMap::new(),
            events: VecDeque::with_capacity(MAX_EVENTS),
        }
    }

    /// Start monitoring a unit from its default state.
    pub fn register_unit(
        &mut self,
        unit: MonitoredUnit,
        initial_temp: f64,
        now: OffsetDateTime,
    ) -> Result<()> {
        if self.units.contains_key(unit.id()) {
            bail!("unit '{}' is already registered", unit.id());
        }

        let state = seed(&unit, initial_temp, now);
        info!(
            unit = %unit.id(),
            location = %unit.location(),
            target_min = unit.target_min(),
            target_max = unit.target_max(),
            initial_temp,
            status = %state.status,
            "unit registered"
        );

        self.units.insert(
            unit.id().to_string(),
            UnitRecord {
                unit,
                state,
                overdue_reported: false,
            },
        );
        Ok(())
    }

    /// Evaluate a validated reading and store the resulting state.
    ///
    /// Returns `None` when the unit is unknown.
    pub fn record_reading(
        &mut self,
        unit_id: &str,
        temp: f64,
        now: OffsetDateTime,
    ) -> Option<Evaluation> {
        let record = self.units.get_mut(unit_id)?;
        let eval = evaluate(&record.unit, &record.state, temp, now);

        info!(
            unit = %unit_id,
            temp,
            status = %eval.state.status,
            trend = %eval.state.trend,
            interval = %eval.state.check_interval,
            consecutive = eval.state.consecutive_high_readings,
            rule = ?eval.rule,
            "reading evaluated"
        );

        record.state = eval.state.clone();
        record.overdue_reported = false;

        let detail = format!(
            "{}: {temp:.1}°F {} ({})",
            record.unit.location(),
            eval.state.status,
            eval.state.trend
        );
        self.push_event(EventKind::Reading, Some(unit_id), detail);

        for alert in &eval.alerts {
            self.record_alert(alert);
        }

        Some(eval)
    }

    /// Log an alert and keep it in the event history.
    pub fn record_alert(&mut self, alert: &Alert) {
        match alert.severity {
            Severity::Critical => error!(
                unit = %alert.unit_id,
                kind = ?alert.kind,
                "{}",
                alert.message
            ),
            Severity::Warning => warn!(
                unit = %alert.unit_id,
                kind = ?alert.kind,
                "{}",
                alert.message
            ),
        }
        self.push_event(
            EventKind::Alert,
            Some(&alert.unit_id),
            format!("[{}] {}", alert.severity, alert.message),
        );
    }

    /// Report units whose check deadline has passed. Each missed deadline is
    /// reported once; a new reading re-arms it.
    pub fn sweep_overdue(&mut self, now: OffsetDateTime) -> Vec<String> {
        let mut newly_overdue = Vec::new();

        for (unit_id, record) in self.units.iter_mut() {
            if record.overdue_reported || !record.state.is_overdue(now) {
                continue;
            }
            record.overdue_reported = true;
            warn!(
                unit = %unit_id,
                due = %record.state.next_check_due,
                status = %record.state.status,
                "temperature check overdue"
            );
            newly_overdue.push(unit_id.clone());
        }

        for unit_id in &newly_overdue {
            let detail = match self.units.get(unit_id) {
                Some(r) => format!("{}: check overdue", r.unit.location()),
                None => continue,
            };
            self.push_event(EventKind::Overdue, Some(unit_id), detail);
        }

        newly_overdue
    }

    /// Record an error event.
    pub fn record_error(&mut self, detail: String) {
        self.push_event(EventKind::Error, None, detail);
    }

    /// Record a generic system event.
    pub fn record_system(&mut self, detail: String) {
        self.push_event(EventKind::System, None, detail);
    }

    pub fn unit_view(&self, unit_id: &str, now: OffsetDateTime) -> Option<UnitView> {
        self.units.get(unit_id).map(|r| r.view(now))
    }

    /// Build the JSON-serialisable status snapshot.
    pub fn to_status(&self, now: OffsetDateTime) -> StatusResponse {
        StatusResponse {
            uptime_secs: self.started_at.elapsed().as_secs(),
            units: self.units.values().map(|r| r.view(now)).collect(),
            events: self.events.iter().rev().cloned().collect(),
        }
    }

    fn push_event(&mut self, kind: EventKind, unit_id: Option<&str>, detail: String) {
        if self.events.len() >= MAX_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(SystemEvent {
            ts: OffsetDateTime::now_utc(),
            kind,
            unit_id: unit_id.map(str::to_string),
            detail,
        });
    }
}

impl Default for SystemState {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitRecord {
    fn view(&self, now: OffsetDateTime) -> UnitView {
        UnitView {
            unit_id: self.unit.id().to_string(),
            location: self.unit.location().to_string(),
            target_min: self.unit.target_min(),
            target_max: self.unit.target_max(),
            state: self.state.clone(),
            advisory: self.state.status.advisory(),
            overdue: self.state.is_overdue(now),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempwatch_compliance::{AlertKind, CheckInterval, Status};
    use time::macros::datetime;
    use time::Duration;

    const T0: OffsetDateTime = datetime!(2024-05-01 13:45 UTC);

    fn test_state() -> SystemState {
        let mut st = SystemState::new();
        st.register_unit(
            MonitoredUnit::new("walk-in-1", "Walk-in Cooler #1", 35.0, 40.0).unwrap(),
            37.0,
            T0,
        )
        .unwrap();
        st.register_unit(
            MonitoredUnit::new("freezer-2", "Freezer Unit #2", -5.0, 5.0).unwrap(),
            0.0,
            T0,
        )
        .unwrap();
        st
    }

    fn events_of(st: &SystemState, kind: EventKind) -> Vec<&SystemEvent> {
        st.events.iter().filter(|e| e.kind == kind).collect()
    }

    // -- Registration -------------------------------------------------------

    #[test]
    fn duplicate_registration_rejected() {
        let mut st = test_state();
        let err = st
            .register_unit(
                MonitoredUnit::new("walk-in-1", "Again", 35.0, 40.0).unwrap(),
                37.0,
                T0,
            )
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
        assert_eq!(st.units["walk-in-1"].unit.location(), "Walk-in Cooler #1");
    }

    #[test]
    fn registration_classifies_initial_temp() {
        let mut st = SystemState::new();
        st.register_unit(
            MonitoredUnit::new("beverage", "Beverage Cooler", 35.0, 40.0).unwrap(),
            55.0,
            T0,
        )
        .unwrap();

        let seeded = &st.units["beverage"].state;
        assert_eq!(seeded.status, Status::Critical);
        assert_eq!(seeded.check_interval, CheckInterval::Escalated);
        assert_eq!(seeded.consecutive_high_readings, 1);
        assert_eq!(
            st.unit_view("beverage", T0).unwrap().advisory,
            Status::Critical.advisory()
        );

        let eval = st
            .record_reading("beverage", 52.0, T0 + Duration::minutes(20))
            .unwrap();
        assert_eq!(eval.alerts.len(), 1);
        assert_eq!(eval.alerts[0].kind, AlertKind::MoveStock);
    }

    // -- Readings -----------------------------------------------------------

    #[test]
    fn unknown_unit_returns_none() {
        let mut st = test_state();
        assert!(st.record_reading("nope", 38.0, T0).is_none());
        assert!(st.events.is_empty());
    }

    #[test]
    fn reading_replaces_state_and_records_event() {
        let mut st = test_state();
        let eval = st.record_reading("walk-in-1", 42.0, T0).unwrap();

        assert_eq!(eval.state.status, Status::Warning);
        assert_eq!(st.units["walk-in-1"].state, eval.state);
        assert_eq!(st.units["freezer-2"].state.current_temp, 0.0);

        let readings = events_of(&st, EventKind::Reading);
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].unit_id.as_deref(), Some("walk-in-1"));
        assert!(readings[0].detail.contains("42.0°F warning"));
    }

    #[test]
    fn consecutive_hot_readings_record_alerts() {
        let mut st = test_state();
        st.record_reading("walk-in-1", 52.0, T0).unwrap();
        let second = st
            .record_reading("walk-in-1", 55.0, T0 + Duration::minutes(20))
            .unwrap();

        assert_eq!(second.alerts[0].kind, AlertKind::MoveStock);
        assert_eq!(st.units["walk-in-1"].state.consecutive_high_readings, 2);

        let alerts = events_of(&st, EventKind::Alert);
        assert_eq!(alerts.len(), 2);
        assert!(alerts[0].detail.contains("20 minutes"));
        assert!(alerts[1].detail.contains("backup storage"));
        assert!(alerts[1].detail.starts_with("[critical]"));
    }

    #[test]
    fn units_evolve_independently() {
        let mut st = test_state();
        st.record_reading("walk-in-1", 52.0, T0).unwrap();
        let freezer = st.record_reading("freezer-2", 52.0, T0).unwrap();

        // The freezer's own history decides its counter.
        assert_eq!(freezer.state.consecutive_high_readings, 1);
        assert_eq!(freezer.alerts[0].kind, AlertKind::IntervalShortened);
    }

    // -- Overdue sweep ------------------------------------------------------

    #[test]
    fn sweep_reports_each_deadline_once() {
        let mut st = test_state();
        let late = T0 + Duration::minutes(181);

        let first = st.sweep_overdue(late);
        assert_eq!(first, vec!["freezer-2".to_string(), "walk-in-1".to_string()]);
        assert!(st.sweep_overdue(late + Duration::minutes(5)).is_empty());
        assert_eq!(events_of(&st, EventKind::Overdue).len(), 2);
    }

    #[test]
    fn sweep_skips_units_not_yet_due() {
        let mut st = test_state();
        assert!(st.sweep_overdue(T0 + Duration::minutes(180)).is_empty());
    }

    #[test]
    fn new_reading_rearms_overdue() {
        let mut st = test_state();
        let late = T0 + Duration::minutes(181);
        st.sweep_overdue(late);

        // Escalated unit is due again 20 minutes after this reading.
        let eval = st.record_reading("walk-in-1", 52.0, late).unwrap();
        assert_eq!(eval.state.check_interval, CheckInterval::Escalated);
        assert!(st.sweep_overdue(late + Duration::minutes(20)).is_empty());
        assert_eq!(
            st.sweep_overdue(late + Duration::minutes(21)),
            vec!["walk-in-1".to_string()]
        );
    }

    // -- Snapshot -----------------------------------------------------------

    #[test]
    fn status_lists_units_and_newest_events_first() {
        let mut st = test_state();
        st.record_system("hub started".to_string());
        st.record_reading("walk-in-1", 44.0, T0).unwrap();

        let status = st.to_status(T0);
        assert_eq!(status.units.len(), 2);
        assert_eq!(status.events.len(), 2);
        assert_eq!(status.events[0].kind, EventKind::Reading);
        assert_eq!(status.events[1].kind, EventKind::System);

        let walk_in = status
            .units
            .iter()
            .find(|u| u.unit_id == "walk-in-1")
            .unwrap();
        assert_eq!(walk_in.state.status, Status::Critical);
        assert!(walk_in.advisory.unwrap().starts_with("CRITICAL"));
        assert!(!walk_in.overdue);
    }

    #[test]
    fn unit_view_serializes_flat() {
        let st = test_state();
        let view = st.unit_view("freezer-2", T0).unwrap();
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["unit_id"], "freezer-2");
        assert_eq!(json["location"], "Freezer Unit #2");
        assert_eq!(json["status"], "normal");
        assert_eq!(json["check_interval"], "standard");
        assert_eq!(json["next_check_due"], "2024-05-01T16:45:00Z");
        assert!(json["advisory"].is_null());
        assert_eq!(json["overdue"], false);
    }

    #[test]
    fn ring_buffer_caps_events() {
        let mut st = SystemState::new();
        for i in 0..(MAX_EVENTS + 10) {
            st.record_error(format!("e{i}"));
        }
        assert_eq!(st.events.len(), MAX_EVENTS);
        assert_eq!(st.events.front().unwrap().detail, "e10");
    }
}
