//! Next-check-due computation.

use time::{Duration, OffsetDateTime};

use crate::model::CheckInterval;

/// Minutes between manual checks while a unit is compliant or only mildly off.
pub const STANDARD_INTERVAL_MIN: i64 = 180;

/// Minutes between manual checks after severe non-compliance.
pub const ESCALATED_INTERVAL_MIN: i64 = 20;

impl CheckInterval {
    pub const fn minutes(self) -> i64 {
        match self {
            CheckInterval::Standard => STANDARD_INTERVAL_MIN,
            CheckInterval::Escalated => ESCALATED_INTERVAL_MIN,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::minutes(self.minutes())
    }
}

/// When the next manual reading is due for a unit checked at `now`.
pub fn next_check(now: OffsetDateTime, interval: CheckInterval) -> OffsetDateTime {
    now + interval.duration()
}
