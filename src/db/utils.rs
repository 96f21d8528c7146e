//! Database utility functions.

use chrono::{DateTime, SubsecRound, Utc};

/// Current time truncated to microseconds, the precision SQLite round-trips.
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
