//! Overdue sweep: periodically flags units whose next manual temperature
//! check is past due.
//!
//! The sweep only reads deadlines produced by the compliance rules; it never
//! changes a unit's status. Each missed deadline yields one `overdue` event.

use std::time::Duration;

use time::OffsetDateTime;
use tracing::info;

use crate::state::SharedState;

/// Run the sweep loop. Intended to be `tokio::spawn`-ed from main.
pub async fn run(shared: SharedState, tick: Duration) {
    let mut ticker = tokio::time::interval(tick);

    info!(tick_sec = tick.as_secs(), "overdue sweep started");

    loop {
        ticker.tick().await;
        sweep_once(&shared, OffsetDateTime::now_utc()).await;
    }
}

/// One pass over every unit. Returns the ids newly reported as overdue.
pub async fn sweep_once(shared: &SharedState, now: OffsetDateTime) -> Vec<String> {
    let mut st = shared.write().await;
    st.sweep_overdue(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{EventKind, SystemState};
    use std::sync::Arc;
    use tempwatch_compliance::MonitoredUnit;
    use time::macros::datetime;
    use tokio::sync::RwLock;

    const T0: OffsetDateTime = datetime!(2024-05-01 13:45 UTC);

    fn test_shared() -> SharedState {
        let mut st = SystemState::new();
        st.register_unit(
            MonitoredUnit::new("beverage", "Beverage Cooler", 35.0, 40.0).unwrap(),
            42.0,
            T0,
        )
        .unwrap();
        Arc::new(RwLock::new(st))
    }

    #[tokio::test]
    async fn sweep_before_deadline_reports_nothing() {
        let shared = test_shared();
        let found = sweep_once(&shared, T0 + time::Duration::minutes(30)).await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn sweep_after_deadline_records_event() {
        let shared = test_shared();
        let found = sweep_once(&shared, T0 + time::Duration::hours(4)).await;
        assert_eq!(found, vec!["beverage".to_string()]);

        let st = shared.read().await;
        let overdue: Vec<_> = st
            .events
            .iter()
            .filter(|e| e.kind == EventKind::Overdue)
            .collect();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].detail, "Beverage Cooler: check overdue");
    }

    #[tokio::test]
    async fn sweep_after_fresh_reading_is_quiet() {
        let shared = test_shared();
        let later = T0 + time::Duration::hours(4);
        {
            let mut st = shared.write().await;
            st.record_reading("beverage", 38.0, later).unwrap();
        }
        assert!(sweep_once(&shared, later + time::Duration::minutes(1))
            .await
            .is_empty());
    }
}
