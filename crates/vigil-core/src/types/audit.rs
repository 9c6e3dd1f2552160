//! Append-only audit records.
//!
//! Every security-relevant decision the engine makes produces one record:
//! release intent, per-recipient delivery outcomes, rejected forced releases
//! and configuration-level failures.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::identifiers::{AuditRecordId, ConfigurationId, CycleId, MessageId, OwnerId, RecipientId};
use crate::time::Timestamp;

/// Actor string used when the engine itself (not an owner) is responsible.
pub const SERVICE_ACTOR: &str = "release-engine";

/// Kind of decision being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Grace period lapsed; release is about to start
    OverdueRelease,
    /// Authorized forced release is about to start
    EmergencyRelease,
    /// Forced release rejected by the authorization guard
    UnauthorizedForcedRelease,
    /// Forced release turned away by the rate limiter
    RateLimitedForcedRelease,
    /// Dispatch to a single recipient
    MessageDelivery,
    /// Message could not be released at all
    MessageReleaseFailed,
    /// Store error while processing a configuration
    ConfigurationFailure,
    /// Owner enabled check-in protection
    ProtectionActivated,
    /// Owner checked in
    CheckIn,
}

impl AuditAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OverdueRelease => "overdue_release",
            Self::EmergencyRelease => "emergency_release",
            Self::UnauthorizedForcedRelease => "unauthorized_forced_release",
            Self::RateLimitedForcedRelease => "rate_limited_forced_release",
            Self::MessageDelivery => "message_delivery",
            Self::MessageReleaseFailed => "message_release_failed",
            Self::ConfigurationFailure => "configuration_failure",
            Self::ProtectionActivated => "protection_activated",
            Self::CheckIn => "check_in",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the recorded decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOutcome {
    Success,
    Failed,
}

/// Resource the record refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditResource {
    Configuration {
        configuration_id: ConfigurationId,
    },
    Cycle {
        configuration_id: ConfigurationId,
        cycle_id: CycleId,
    },
    Message {
        message_id: MessageId,
    },
    Delivery {
        message_id: MessageId,
        recipient_id: RecipientId,
    },
    Endpoint {
        name: String,
    },
}

/// One append-only audit row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditRecordId,
    /// Owner id rendered as a string, or [`SERVICE_ACTOR`]
    pub actor: String,
    pub action: AuditAction,
    pub resource: AuditResource,
    pub outcome: AuditOutcome,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub origin: Option<String>,
}

impl AuditRecord {
    /// Start a record; metadata and origin default to empty.
    pub fn new(
        actor: impl Into<String>,
        action: AuditAction,
        resource: AuditResource,
        outcome: AuditOutcome,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: AuditRecordId::new(),
            actor: actor.into(),
            action,
            resource,
            outcome,
            metadata: serde_json::Value::Null,
            timestamp,
            origin: None,
        }
    }

    /// Record attributed to an owner.
    pub fn for_owner(
        owner: OwnerId,
        action: AuditAction,
        resource: AuditResource,
        outcome: AuditOutcome,
        timestamp: Timestamp,
    ) -> Self {
        Self::new(owner.to_string(), action, resource, outcome, timestamp)
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_origin(mut self, origin: Option<String>) -> Self {
        self.origin = origin;
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome == AuditOutcome::Success
    }
}
