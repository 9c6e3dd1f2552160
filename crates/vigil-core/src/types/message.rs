//! Protected messages and the recipients they are delivered to.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::identifiers::{MessageId, OwnerId, RecipientId};
use crate::time::Timestamp;

/// Whether a message follows an absolute schedule or the check-in mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageScope {
    Normal,
    Protected,
}

/// Delivery status of a message.
///
/// `Sent` and `Failed` are terminal. The `Scheduled` filter on protected
/// messages is the idempotency boundary of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Draft,
    Scheduled,
    Sent,
    Failed,
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Draft => "DRAFT",
            Self::Scheduled => "SCHEDULED",
            Self::Sent => "SENT",
            Self::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// A pre-authored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedMessage {
    pub id: MessageId,
    pub owner_id: OwnerId,
    pub title: String,
    pub body: String,
    pub recipient_ids: Vec<RecipientId>,
    pub scope: MessageScope,
    pub status: MessageStatus,
    #[serde(default)]
    pub sent_at: Option<Timestamp>,
}

impl ProtectedMessage {
    /// Eligible for release by the check-in engine.
    pub fn is_releasable(&self) -> bool {
        self.scope == MessageScope::Protected && self.status == MessageStatus::Scheduled
    }
}

/// Delivery target, owned by the message owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RecipientId,
    pub owner_id: OwnerId,
    pub display_name: String,
    pub email: String,
}
