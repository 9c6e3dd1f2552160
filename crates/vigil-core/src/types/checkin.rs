//! Check-in configurations and their cycles.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::identifiers::{ConfigurationId, CycleId, OwnerId};
use crate::time::{Span, TimeUnit, Timestamp};

/// An owner's check-in protection settings.
///
/// Created by the owner and only ever read by the release engine; the engine
/// mutates cycles, never the configuration itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInConfiguration {
    pub id: ConfigurationId,
    pub owner_id: OwnerId,
    /// Interval between required check-ins
    pub frequency: Span,
    /// Extra time allowed past a missed deadline
    pub grace_duration: u32,
    pub grace_unit: TimeUnit,
    pub created_at: Timestamp,
    /// After this instant the owner can no longer check in
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
}

impl CheckInConfiguration {
    /// Grace period in milliseconds.
    pub fn grace_period_ms(&self) -> u64 {
        self.grace_unit.to_millis(u64::from(self.grace_duration))
    }

    /// Whether the configuration has passed its expiry bound.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expiry| now > expiry)
    }
}

/// Lifecycle state of a check-in cycle.
///
/// `Overdue` and `CheckedIn` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleState {
    /// Waiting for the owner to check in before the deadline
    Active,
    /// Grace period lapsed (or a forced release ran); content was released
    Overdue,
    /// Owner checked in; superseded by the next cycle
    CheckedIn,
}

impl CycleState {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Active => "ACTIVE",
            Self::Overdue => "OVERDUE",
            Self::CheckedIn => "CHECKED_IN",
        };
        f.write_str(label)
    }
}

/// One deadline-to-deadline interval of a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInCycle {
    pub id: CycleId,
    pub configuration_id: ConfigurationId,
    /// Monotonically increasing per configuration
    pub sequence: u64,
    pub next_checkin_deadline: Timestamp,
    pub state: CycleState,
    #[serde(default)]
    pub completed_at: Option<Timestamp>,
}

impl CheckInCycle {
    /// Fresh active cycle.
    pub fn active(
        configuration_id: ConfigurationId,
        sequence: u64,
        next_checkin_deadline: Timestamp,
    ) -> Self {
        Self {
            id: CycleId::new(),
            configuration_id,
            sequence,
            next_checkin_deadline,
            state: CycleState::Active,
            completed_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == CycleState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(expires_at: Option<Timestamp>) -> CheckInConfiguration {
        CheckInConfiguration {
            id: ConfigurationId::from_u128(1),
            owner_id: OwnerId::from_u128(2),
            frequency: Span::days(7),
            grace_duration: 3,
            grace_unit: TimeUnit::Days,
            created_at: Timestamp::from_millis(0),
            expires_at,
        }
    }

    #[test]
    fn grace_period_uses_unit() {
        assert_eq!(config(None).grace_period_ms(), 3 * 86_400_000);
    }

    #[test]
    fn expiry_is_exclusive() {
        let cfg = config(Some(Timestamp::from_millis(1_000)));
        assert!(!cfg.is_expired(Timestamp::from_millis(1_000)));
        assert!(cfg.is_expired(Timestamp::from_millis(1_001)));
        assert!(!config(None).is_expired(Timestamp::from_millis(u64::MAX)));
    }

    #[test]
    fn cycle_state_wire_format() {
        let json = serde_json::to_string(&CycleState::CheckedIn).unwrap_or_default();
        assert_eq!(json, "\"CHECKED_IN\"");
        assert!(CycleState::Overdue.is_terminal());
        assert!(!CycleState::Active.is_terminal());
    }
}
