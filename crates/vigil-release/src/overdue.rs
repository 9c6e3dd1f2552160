//! Overdue evaluation.
//!
//! A cycle is overdue once the current time is strictly past its deadline plus
//! the configuration's grace period. The evaluation is pure: identical inputs
//! always produce the same answer.

use vigil_core::{CheckInConfiguration, CheckInCycle, Timestamp};

/// Instant after which the cycle counts as overdue.
pub fn grace_deadline(cycle: &CheckInCycle, config: &CheckInConfiguration) -> Timestamp {
    cycle
        .next_checkin_deadline
        .saturating_add_ms(config.grace_period_ms())
}

/// `now > deadline + grace`. Exactly at the grace deadline is not overdue.
pub fn is_overdue(cycle: &CheckInCycle, config: &CheckInConfiguration, now: Timestamp) -> bool {
    now > grace_deadline(cycle, config)
}

/// Milliseconds left before the cycle becomes overdue, zero once it is.
pub fn remaining_grace_ms(
    cycle: &CheckInCycle,
    config: &CheckInConfiguration,
    now: Timestamp,
) -> u64 {
    grace_deadline(cycle, config)
        .as_millis()
        .saturating_sub(now.as_millis())
}
