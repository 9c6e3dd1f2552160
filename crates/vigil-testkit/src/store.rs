//! Fault-injecting wrapper around [`MemoryReleaseStore`].
//!
//! Faults are toggled through a shared [`StoreFaults`] handle so a test can
//! break the store after the engine has been built.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use vigil_core::effects::{AuditStore, ReleaseStore, StoreError};
use vigil_core::{
    AuditRecord, CheckInConfiguration, CheckInCycle, ConfigurationId, CycleId, CycleState,
    MessageId, MessageStatus, OwnerId, ProtectedMessage, Recipient, RecipientId, Timestamp,
};
use vigil_effects::MemoryReleaseStore;

#[derive(Debug, Default)]
struct FaultState {
    list_configurations: bool,
    audit: bool,
    messages_for: HashSet<OwnerId>,
    recipients_for: HashSet<OwnerId>,
    steal_claims: bool,
}

/// Shared switchboard for [`FaultyStore`].
#[derive(Debug, Clone, Default)]
pub struct StoreFaults {
    state: Arc<Mutex<FaultState>>,
}

impl StoreFaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// `list_configurations` returns `Unavailable`.
    pub fn fail_list_configurations(&self) {
        self.state.lock().list_configurations = true;
    }

    /// `append_audit` returns `Unavailable`.
    pub fn fail_audit(&self) {
        self.state.lock().audit = true;
    }

    /// `list_releasable_messages` fails for this owner.
    pub fn fail_messages_for(&self, owner: OwnerId) {
        self.state.lock().messages_for.insert(owner);
    }

    /// `resolve_recipients` fails for this owner.
    pub fn fail_recipients_for(&self, owner: OwnerId) {
        self.state.lock().recipients_for.insert(owner);
    }

    /// Every `Scheduled -> Sent` claim is won by a simulated concurrent
    /// invocation: the message is moved to `Sent` but the caller sees `false`.
    pub fn steal_claims(&self) {
        self.state.lock().steal_claims = true;
    }

    pub fn clear(&self) {
        *self.state.lock() = FaultState::default();
    }
}

/// [`MemoryReleaseStore`] with switchable failures.
#[derive(Debug, Clone)]
pub struct FaultyStore {
    inner: MemoryReleaseStore,
    faults: StoreFaults,
}

impl FaultyStore {
    pub fn new(inner: MemoryReleaseStore, faults: StoreFaults) -> Self {
        Self { inner, faults }
    }

    pub fn inner(&self) -> &MemoryReleaseStore {
        &self.inner
    }

    pub fn faults(&self) -> &StoreFaults {
        &self.faults
    }
}

#[async_trait]
impl ReleaseStore for FaultyStore {
    async fn list_configurations(&self) -> Result<Vec<CheckInConfiguration>, StoreError> {
        let failing = self.faults.state.lock().list_configurations;
        if failing {
            return Err(StoreError::unavailable("configuration table offline"));
        }
        self.inner.list_configurations().await
    }

    async fn get_configuration(
        &self,
        id: ConfigurationId,
    ) -> Result<Option<CheckInConfiguration>, StoreError> {
        self.inner.get_configuration(id).await
    }

    async fn list_cycles(
        &self,
        configuration_id: ConfigurationId,
    ) -> Result<Vec<CheckInCycle>, StoreError> {
        self.inner.list_cycles(configuration_id).await
    }

    async fn insert_cycle(&self, cycle: CheckInCycle) -> Result<(), StoreError> {
        self.inner.insert_cycle(cycle).await
    }

    async fn transition_cycle(
        &self,
        id: CycleId,
        from: CycleState,
        to: CycleState,
        completed_at: Option<Timestamp>,
    ) -> Result<bool, StoreError> {
        self.inner.transition_cycle(id, from, to, completed_at).await
    }

    async fn list_releasable_messages(
        &self,
        owner_id: OwnerId,
    ) -> Result<Vec<ProtectedMessage>, StoreError> {
        let failing = self.faults.state.lock().messages_for.contains(&owner_id);
        if failing {
            return Err(StoreError::backend(format!(
                "message query failed for {owner_id}"
            )));
        }
        self.inner.list_releasable_messages(owner_id).await
    }

    async fn transition_message(
        &self,
        id: MessageId,
        from: MessageStatus,
        to: MessageStatus,
        sent_at: Option<Timestamp>,
    ) -> Result<bool, StoreError> {
        let steal = self.faults.state.lock().steal_claims;
        if steal && from == MessageStatus::Scheduled && to == MessageStatus::Sent {
            self.inner.transition_message(id, from, to, sent_at).await?;
            return Ok(false);
        }
        self.inner.transition_message(id, from, to, sent_at).await
    }

    async fn resolve_recipients(
        &self,
        owner_id: OwnerId,
        ids: &[RecipientId],
    ) -> Result<Vec<Recipient>, StoreError> {
        let failing = self.faults.state.lock().recipients_for.contains(&owner_id);
        if failing {
            return Err(StoreError::unavailable("recipient table offline"));
        }
        self.inner.resolve_recipients(owner_id, ids).await
    }
}

#[async_trait]
impl AuditStore for FaultyStore {
    async fn append_audit(&self, record: AuditRecord) -> Result<(), StoreError> {
        let failing = self.faults.state.lock().audit;
        if failing {
            return Err(StoreError::unavailable("audit table offline"));
        }
        self.inner.append_audit(record).await
    }
}
