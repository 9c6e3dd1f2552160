//! Domain records read and written by the release engine.

pub mod audit;
pub mod checkin;
pub mod identifiers;
pub mod message;

pub use audit::{AuditAction, AuditOutcome, AuditRecord, AuditResource, SERVICE_ACTOR};
pub use checkin::{CheckInConfiguration, CheckInCycle, CycleState};
pub use identifiers::{AuditRecordId, ConfigurationId, CycleId, MessageId, OwnerId, RecipientId};
pub use message::{MessageScope, MessageStatus, ProtectedMessage, Recipient};
