//! Persistence collaborator for configurations, cycles, messages and recipients.
//!
//! # Effect Classification
//!
//! - **Category**: Infrastructure Effect
//! - **Implementation**: `vigil-effects` (`MemoryReleaseStore`)
//! - **Usage**: Cycle store adapter, release orchestrator, check-in service
//!
//! State changes are expressed as conditional transitions: the caller names the
//! state it expects and the store only applies the update if the record is
//! still in that state. A `false` return means another writer got there first.
//! Implementations must offer read-after-write consistency for a single record.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::time::Timestamp;
use crate::types::{
    CheckInConfiguration, CheckInCycle, ConfigurationId, CycleId, CycleState, MessageId,
    MessageStatus, OwnerId, ProtectedMessage, Recipient, RecipientId,
};

/// Storage operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum StoreError {
    /// Backend could not be reached
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },
    /// Referenced record does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
    /// Write would violate a store invariant
    #[error("conflict: {reason}")]
    Conflict { reason: String },
    /// Any other backend failure
    #[error("store backend error: {reason}")]
    Backend { reason: String },
}

impl StoreError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }
}

/// Read/write surface the release engine needs from persistence.
#[async_trait]
pub trait ReleaseStore: Send + Sync {
    /// Every configuration known to the store.
    async fn list_configurations(&self) -> Result<Vec<CheckInConfiguration>, StoreError>;

    /// Single configuration lookup.
    async fn get_configuration(
        &self,
        id: ConfigurationId,
    ) -> Result<Option<CheckInConfiguration>, StoreError>;

    /// Cycles of a configuration ordered by sequence, highest first.
    async fn list_cycles(
        &self,
        configuration_id: ConfigurationId,
    ) -> Result<Vec<CheckInCycle>, StoreError>;

    /// Insert a new cycle. Fails with `Conflict` if the configuration already
    /// has an active cycle or the sequence number is not strictly increasing.
    async fn insert_cycle(&self, cycle: CheckInCycle) -> Result<(), StoreError>;

    /// Move a cycle from `from` to `to`, stamping `completed_at`.
    async fn transition_cycle(
        &self,
        id: CycleId,
        from: CycleState,
        to: CycleState,
        completed_at: Option<Timestamp>,
    ) -> Result<bool, StoreError>;

    /// Protected messages of an owner whose status is `Scheduled`.
    async fn list_releasable_messages(
        &self,
        owner_id: OwnerId,
    ) -> Result<Vec<ProtectedMessage>, StoreError>;

    /// Move a message from `from` to `to`, stamping `sent_at`.
    async fn transition_message(
        &self,
        id: MessageId,
        from: MessageStatus,
        to: MessageStatus,
        sent_at: Option<Timestamp>,
    ) -> Result<bool, StoreError>;

    /// Resolve recipients owned by `owner_id`. Unknown ids are omitted.
    async fn resolve_recipients(
        &self,
        owner_id: OwnerId,
        ids: &[RecipientId],
    ) -> Result<Vec<Recipient>, StoreError>;
}

#[async_trait]
impl<T: ReleaseStore + ?Sized> ReleaseStore for std::sync::Arc<T> {
    async fn list_configurations(&self) -> Result<Vec<CheckInConfiguration>, StoreError> {
        (**self).list_configurations().await
    }

    async fn get_configuration(
        &self,
        id: ConfigurationId,
    ) -> Result<Option<CheckInConfiguration>, StoreError> {
        (**self).get_configuration(id).await
    }

    async fn list_cycles(
        &self,
        configuration_id: ConfigurationId,
    ) -> Result<Vec<CheckInCycle>, StoreError> {
        (**self).list_cycles(configuration_id).await
    }

    async fn insert_cycle(&self, cycle: CheckInCycle) -> Result<(), StoreError> {
        (**self).insert_cycle(cycle).await
    }

    async fn transition_cycle(
        &self,
        id: CycleId,
        from: CycleState,
        to: CycleState,
        completed_at: Option<Timestamp>,
    ) -> Result<bool, StoreError> {
        (**self).transition_cycle(id, from, to, completed_at).await
    }

    async fn list_releasable_messages(
        &self,
        owner_id: OwnerId,
    ) -> Result<Vec<ProtectedMessage>, StoreError> {
        (**self).list_releasable_messages(owner_id).await
    }

    async fn transition_message(
        &self,
        id: MessageId,
        from: MessageStatus,
        to: MessageStatus,
        sent_at: Option<Timestamp>,
    ) -> Result<bool, StoreError> {
        (**self).transition_message(id, from, to, sent_at).await
    }

    async fn resolve_recipients(
        &self,
        owner_id: OwnerId,
        ids: &[RecipientId],
    ) -> Result<Vec<Recipient>, StoreError> {
        (**self).resolve_recipients(owner_id, ids).await
    }
}
