//! In-memory persistence handler
//!
//! Holds every record behind one `RwLock` so conditional transitions are
//! atomic with respect to each other. Suitable for single-process deployments
//! and as the backing store in tests; state can be seeded from a JSON snapshot.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use vigil_core::effects::{AuditStore, ReleaseStore, StoreError};
use vigil_core::{
    AuditRecord, CheckInConfiguration, CheckInCycle, ConfigurationId, CycleId, CycleState,
    MessageId, MessageStatus, OwnerId, ProtectedMessage, Recipient, RecipientId, Timestamp,
    VigilError, VigilResult,
};

/// Serializable view of the whole store, used for fixtures and inspection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub configurations: Vec<CheckInConfiguration>,
    #[serde(default)]
    pub cycles: Vec<CheckInCycle>,
    #[serde(default)]
    pub messages: Vec<ProtectedMessage>,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
    #[serde(default)]
    pub audit: Vec<AuditRecord>,
}

#[derive(Debug, Default)]
struct StoreState {
    configurations: HashMap<ConfigurationId, CheckInConfiguration>,
    cycles: HashMap<CycleId, CheckInCycle>,
    messages: HashMap<MessageId, ProtectedMessage>,
    recipients: HashMap<RecipientId, Recipient>,
    audit: Vec<AuditRecord>,
}

impl StoreState {
    fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            configurations: snapshot
                .configurations
                .into_iter()
                .map(|c| (c.id, c))
                .collect(),
            cycles: snapshot.cycles.into_iter().map(|c| (c.id, c)).collect(),
            messages: snapshot.messages.into_iter().map(|m| (m.id, m)).collect(),
            recipients: snapshot.recipients.into_iter().map(|r| (r.id, r)).collect(),
            audit: snapshot.audit,
        }
    }

    fn cycles_of(&self, configuration_id: ConfigurationId) -> impl Iterator<Item = &CheckInCycle> {
        self.cycles
            .values()
            .filter(move |c| c.configuration_id == configuration_id)
    }
}

/// In-memory implementation of `ReleaseStore` and `AuditStore`.
#[derive(Debug, Clone, Default)]
pub struct MemoryReleaseStore {
    state: Arc<RwLock<StoreState>>,
}

impl MemoryReleaseStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated from a snapshot
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::from_snapshot(snapshot))),
        }
    }

    /// Load a JSON snapshot from disk
    pub async fn load_json(path: &Path) -> VigilResult<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let snapshot: StoreSnapshot = serde_json::from_str(&raw).map_err(|e| {
            VigilError::serialization(format!(
                "failed to parse store fixture {}: {e}",
                path.display()
            ))
        })?;
        debug!(
            path = %path.display(),
            configurations = snapshot.configurations.len(),
            messages = snapshot.messages.len(),
            "loaded store fixture"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Copy of the current contents, ordered for stable comparisons
    pub async fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read().await;
        let mut configurations: Vec<_> = state.configurations.values().cloned().collect();
        configurations.sort_by_key(|c| c.id);
        let mut cycles: Vec<_> = state.cycles.values().cloned().collect();
        cycles.sort_by_key(|c| (c.configuration_id, c.sequence));
        let mut messages: Vec<_> = state.messages.values().cloned().collect();
        messages.sort_by_key(|m| m.id);
        let mut recipients: Vec<_> = state.recipients.values().cloned().collect();
        recipients.sort_by_key(|r| r.id);
        StoreSnapshot {
            configurations,
            cycles,
            messages,
            recipients,
            audit: state.audit.clone(),
        }
    }

    pub async fn put_configuration(&self, configuration: CheckInConfiguration) {
        self.state
            .write()
            .await
            .configurations
            .insert(configuration.id, configuration);
    }

    pub async fn put_message(&self, message: ProtectedMessage) {
        self.state.write().await.messages.insert(message.id, message);
    }

    pub async fn put_recipient(&self, recipient: Recipient) {
        self.state
            .write()
            .await
            .recipients
            .insert(recipient.id, recipient);
    }

    /// Insert a cycle without invariant checks (fixtures only)
    pub async fn put_cycle(&self, cycle: CheckInCycle) {
        self.state.write().await.cycles.insert(cycle.id, cycle);
    }

    pub async fn message(&self, id: MessageId) -> Option<ProtectedMessage> {
        self.state.read().await.messages.get(&id).cloned()
    }

    pub async fn cycle(&self, id: CycleId) -> Option<CheckInCycle> {
        self.state.read().await.cycles.get(&id).cloned()
    }

    /// All audit records in append order
    pub async fn audit_records(&self) -> Vec<AuditRecord> {
        self.state.read().await.audit.clone()
    }
}

#[async_trait]
impl ReleaseStore for MemoryReleaseStore {
    async fn list_configurations(&self) -> Result<Vec<CheckInConfiguration>, StoreError> {
        let state = self.state.read().await;
        let mut configurations: Vec<_> = state.configurations.values().cloned().collect();
        configurations.sort_by_key(|c| (c.created_at, c.id));
        Ok(configurations)
    }

    async fn get_configuration(
        &self,
        id: ConfigurationId,
    ) -> Result<Option<CheckInConfiguration>, StoreError> {
        Ok(self.state.read().await.configurations.get(&id).cloned())
    }

    async fn list_cycles(
        &self,
        configuration_id: ConfigurationId,
    ) -> Result<Vec<CheckInCycle>, StoreError> {
        let state = self.state.read().await;
        let mut cycles: Vec<_> = state.cycles_of(configuration_id).cloned().collect();
        cycles.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        Ok(cycles)
    }

    async fn insert_cycle(&self, cycle: CheckInCycle) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.configurations.contains_key(&cycle.configuration_id) {
            return Err(StoreError::not_found(
                "configuration",
                cycle.configuration_id,
            ));
        }
        if cycle.is_active()
            && state
                .cycles_of(cycle.configuration_id)
                .any(CheckInCycle::is_active)
        {
            return Err(StoreError::conflict(format!(
                "{} already has an active cycle",
                cycle.configuration_id
            )));
        }
        if let Some(latest) = state
            .cycles_of(cycle.configuration_id)
            .map(|c| c.sequence)
            .max()
        {
            if cycle.sequence <= latest {
                return Err(StoreError::conflict(format!(
                    "cycle sequence {} does not follow {latest}",
                    cycle.sequence
                )));
            }
        }
        state.cycles.insert(cycle.id, cycle);
        Ok(())
    }

    async fn transition_cycle(
        &self,
        id: CycleId,
        from: CycleState,
        to: CycleState,
        completed_at: Option<Timestamp>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let cycle = state
            .cycles
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("cycle", id))?;
        if cycle.state != from {
            return Ok(false);
        }
        cycle.state = to;
        cycle.completed_at = completed_at;
        Ok(true)
    }

    async fn list_releasable_messages(
        &self,
        owner_id: OwnerId,
    ) -> Result<Vec<ProtectedMessage>, StoreError> {
        let state = self.state.read().await;
        let mut messages: Vec<_> = state
            .messages
            .values()
            .filter(|m| m.owner_id == owner_id && m.is_releasable())
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.id);
        Ok(messages)
    }

    async fn transition_message(
        &self,
        id: MessageId,
        from: MessageStatus,
        to: MessageStatus,
        sent_at: Option<Timestamp>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let message = state
            .messages
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("message", id))?;
        if message.status != from {
            return Ok(false);
        }
        message.status = to;
        if sent_at.is_some() {
            message.sent_at = sent_at;
        }
        Ok(true)
    }

    async fn resolve_recipients(
        &self,
        owner_id: OwnerId,
        ids: &[RecipientId],
    ) -> Result<Vec<Recipient>, StoreError> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.recipients.get(id))
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AuditStore for MemoryReleaseStore {
    async fn append_audit(&self, record: AuditRecord) -> Result<(), StoreError> {
        self.state.write().await.audit.push(record);
        Ok(())
    }
}
