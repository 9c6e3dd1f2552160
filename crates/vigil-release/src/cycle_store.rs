//! Check-in cycle store adapter.
//!
//! Narrow view of [`ReleaseStore`] used by the orchestrator and the check-in
//! service: enumerate configurations, find the current cycle of each, and move
//! cycles between states with conditional writes.

use vigil_core::effects::{ReleaseStore, StoreError};
use vigil_core::{
    CheckInConfiguration, CheckInCycle, ConfigurationId, CycleState, Timestamp,
};

#[derive(Debug, Clone)]
pub struct CycleStore<S> {
    store: S,
}

impl<S: ReleaseStore> CycleStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn list_configurations(&self) -> Result<Vec<CheckInConfiguration>, StoreError> {
        self.store.list_configurations().await
    }

    pub async fn configuration(
        &self,
        id: ConfigurationId,
    ) -> Result<CheckInConfiguration, StoreError> {
        self.store
            .get_configuration(id)
            .await?
            .ok_or_else(|| StoreError::not_found("configuration", id))
    }

    /// Cycle with the highest sequence, if any.
    pub async fn latest_cycle(
        &self,
        configuration_id: ConfigurationId,
    ) -> Result<Option<CheckInCycle>, StoreError> {
        let cycles = self.store.list_cycles(configuration_id).await?;
        Ok(cycles.into_iter().max_by_key(|c| c.sequence))
    }

    /// Latest cycle, only if it is still `Active`.
    pub async fn active_cycle(
        &self,
        configuration_id: ConfigurationId,
    ) -> Result<Option<CheckInCycle>, StoreError> {
        Ok(self
            .latest_cycle(configuration_id)
            .await?
            .filter(CheckInCycle::is_active))
    }

    /// `Active -> Overdue`. `false` if the cycle already left `Active`.
    pub async fn mark_overdue(
        &self,
        cycle: &CheckInCycle,
        now: Timestamp,
    ) -> Result<bool, StoreError> {
        self.store
            .transition_cycle(cycle.id, CycleState::Active, CycleState::Overdue, Some(now))
            .await
    }

    /// `Active -> CheckedIn`. `false` if the cycle already left `Active`.
    pub async fn mark_checked_in(
        &self,
        cycle: &CheckInCycle,
        now: Timestamp,
    ) -> Result<bool, StoreError> {
        self.store
            .transition_cycle(
                cycle.id,
                CycleState::Active,
                CycleState::CheckedIn,
                Some(now),
            )
            .await
    }

    /// Open the next active cycle after `previous` (or the first one).
    pub async fn open_cycle(
        &self,
        configuration: &CheckInConfiguration,
        previous: Option<&CheckInCycle>,
        now: Timestamp,
    ) -> Result<CheckInCycle, StoreError> {
        let sequence = previous.map_or(1, |c| c.sequence + 1);
        let deadline = now.saturating_add_ms(configuration.frequency.as_millis());
        let cycle = CheckInCycle::active(configuration.id, sequence, deadline);
        self.store.insert_cycle(cycle.clone()).await?;
        Ok(cycle)
    }
}
