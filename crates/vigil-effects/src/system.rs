//! Composite effect system
//!
//! Bundles one handler per effect behind trait objects and implements every
//! effect trait by delegation, so the engine sees a single `ReleaseEffects`
//! value regardless of which handlers were plugged in.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use vigil_core::effects::{
    AuditStore, DispatchError, DispatchReceipt, EmailDispatchEffects, EmailRequest,
    PhysicalTimeEffects, ReleaseStore, StoreError, TimeError,
};
use vigil_core::{
    AuditRecord, CheckInConfiguration, CheckInCycle, ConfigurationId, CycleId, CycleState,
    MessageId, MessageStatus, OwnerId, ProtectedMessage, Recipient, RecipientId, Timestamp,
};

use crate::{LogDispatchHandler, MemoryReleaseStore, RealTimeHandler};

/// Handler set used by the release engine.
#[derive(Clone)]
pub struct ReleaseEffectSystem {
    time: Arc<dyn PhysicalTimeEffects>,
    store: Arc<dyn ReleaseStore>,
    audit: Arc<dyn AuditStore>,
    dispatch: Arc<dyn EmailDispatchEffects>,
}

impl ReleaseEffectSystem {
    pub fn new(
        time: Arc<dyn PhysicalTimeEffects>,
        store: Arc<dyn ReleaseStore>,
        audit: Arc<dyn AuditStore>,
        dispatch: Arc<dyn EmailDispatchEffects>,
    ) -> Self {
        Self {
            time,
            store,
            audit,
            dispatch,
        }
    }

    /// System clock over an in-memory store that also keeps the audit log.
    pub fn with_memory_store(
        store: MemoryReleaseStore,
        dispatch: Arc<dyn EmailDispatchEffects>,
    ) -> Self {
        let store = Arc::new(store);
        Self::new(
            Arc::new(RealTimeHandler::new()),
            store.clone(),
            store,
            dispatch,
        )
    }

    /// Empty in-memory store with log-only dispatch.
    pub fn for_local_use() -> Self {
        Self::with_memory_store(
            MemoryReleaseStore::new(),
            Arc::new(LogDispatchHandler::new()),
        )
    }

    pub fn with_time(mut self, time: Arc<dyn PhysicalTimeEffects>) -> Self {
        self.time = time;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditStore>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_dispatch(mut self, dispatch: Arc<dyn EmailDispatchEffects>) -> Self {
        self.dispatch = dispatch;
        self
    }
}

impl fmt::Debug for ReleaseEffectSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseEffectSystem").finish_non_exhaustive()
    }
}

#[async_trait]
impl PhysicalTimeEffects for ReleaseEffectSystem {
    async fn physical_time(&self) -> Result<Timestamp, TimeError> {
        self.time.physical_time().await
    }
}

#[async_trait]
impl ReleaseStore for ReleaseEffectSystem {
    async fn list_configurations(&self) -> Result<Vec<CheckInConfiguration>, StoreError> {
        self.store.list_configurations().await
    }

    async fn get_configuration(
        &self,
        id: ConfigurationId,
    ) -> Result<Option<CheckInConfiguration>, StoreError> {
        self.store.get_configuration(id).await
    }

    async fn list_cycles(
        &self,
        configuration_id: ConfigurationId,
    ) -> Result<Vec<CheckInCycle>, StoreError> {
        self.store.list_cycles(configuration_id).await
    }

    async fn insert_cycle(&self, cycle: CheckInCycle) -> Result<(), StoreError> {
        self.store.insert_cycle(cycle).await
    }

    async fn transition_cycle(
        &self,
        id: CycleId,
        from: CycleState,
        to: CycleState,
        completed_at: Option<Timestamp>,
    ) -> Result<bool, StoreError> {
        self.store.transition_cycle(id, from, to, completed_at).await
    }

    async fn list_releasable_messages(
        &self,
        owner_id: OwnerId,
    ) -> Result<Vec<ProtectedMessage>, StoreError> {
        self.store.list_releasable_messages(owner_id).await
    }

    async fn transition_message(
        &self,
        id: MessageId,
        from: MessageStatus,
        to: MessageStatus,
        sent_at: Option<Timestamp>,
    ) -> Result<bool, StoreError> {
        self.store.transition_message(id, from, to, sent_at).await
    }

    async fn resolve_recipients(
        &self,
        owner_id: OwnerId,
        ids: &[RecipientId],
    ) -> Result<Vec<Recipient>, StoreError> {
        self.store.resolve_recipients(owner_id, ids).await
    }
}

#[async_trait]
impl AuditStore for ReleaseEffectSystem {
    async fn append_audit(&self, record: AuditRecord) -> Result<(), StoreError> {
        self.audit.append_audit(record).await
    }
}

#[async_trait]
impl EmailDispatchEffects for ReleaseEffectSystem {
    async fn send_email(&self, request: EmailRequest) -> Result<DispatchReceipt, DispatchError> {
        self.dispatch.send_email(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::effects::ReleaseEffects;

    fn requires_release_effects<E: ReleaseEffects>(_effects: &E) {}

    #[tokio::test]
    async fn test_local_system_satisfies_release_effects() {
        let system = ReleaseEffectSystem::for_local_use();
        requires_release_effects(&system);
        assert!(system.list_configurations().await.unwrap().is_empty());
        assert!(system.current_timestamp_ms().await > 0);
    }
}
