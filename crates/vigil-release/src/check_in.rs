//! Owner-facing cycle operations.
//!
//! Activating protection opens the first cycle of a configuration; checking in
//! closes the current cycle as `CheckedIn` and opens the next one, so exactly
//! one cycle stays `Active` at any time.

use std::sync::Arc;
use tracing::{info, warn};
use vigil_core::effects::ReleaseEffects;
use vigil_core::{
    AuditAction, AuditOutcome, AuditRecord, AuditResource, CheckInCycle, ConfigurationId,
    VigilError, VigilResult,
};

use crate::audit::AuditSink;
use crate::cycle_store::CycleStore;
use crate::orchestrator::{ConfigurationLease, ConfigurationLocks};
use crate::overdue::{is_overdue, remaining_grace_ms};

pub struct CheckInService<E> {
    effects: Arc<E>,
    cycles: CycleStore<Arc<E>>,
    audit: AuditSink<Arc<E>>,
    locks: Arc<ConfigurationLocks>,
}

impl<E: ReleaseEffects> CheckInService<E> {
    pub fn new(effects: Arc<E>, locks: Arc<ConfigurationLocks>) -> Self {
        Self {
            cycles: CycleStore::new(effects.clone()),
            audit: AuditSink::new(effects.clone()),
            effects,
            locks,
        }
    }

    /// Open the first (or next) active cycle, due one frequency from now.
    pub async fn activate_protection(
        &self,
        configuration_id: ConfigurationId,
    ) -> VigilResult<CheckInCycle> {
        let now = self.effects.physical_time().await?;
        let _lease = self.lease(configuration_id)?;

        let configuration = self.cycles.configuration(configuration_id).await?;
        let latest = self.cycles.latest_cycle(configuration_id).await?;
        if latest.as_ref().is_some_and(CheckInCycle::is_active) {
            return Err(VigilError::invalid(format!(
                "configuration {configuration_id} already has an active cycle"
            )));
        }

        let cycle = self
            .cycles
            .open_cycle(&configuration, latest.as_ref(), now)
            .await?;
        info!(
            configuration = %configuration_id,
            sequence = cycle.sequence,
            deadline = %cycle.next_checkin_deadline,
            "check-in protection activated"
        );

        self.audit
            .record(
                AuditRecord::for_owner(
                    configuration.owner_id,
                    AuditAction::ProtectionActivated,
                    AuditResource::Cycle {
                        configuration_id,
                        cycle_id: cycle.id,
                    },
                    AuditOutcome::Success,
                    now,
                )
                .with_metadata(serde_json::json!({
                    "sequence": cycle.sequence,
                    "deadline": cycle.next_checkin_deadline,
                })),
            )
            .await;
        Ok(cycle)
    }

    /// Close the active cycle and open the next. Returns the new cycle.
    ///
    /// Rejected once the cycle is overdue or the configuration has expired.
    pub async fn check_in(&self, configuration_id: ConfigurationId) -> VigilResult<CheckInCycle> {
        let now = self.effects.physical_time().await?;
        let _lease = self.lease(configuration_id)?;

        let configuration = self.cycles.configuration(configuration_id).await?;
        if configuration.is_expired(now) {
            warn!(configuration = %configuration_id, "check-in after expiry rejected");
            return Err(VigilError::invalid(format!(
                "configuration {configuration_id} has expired"
            )));
        }

        let Some(current) = self.cycles.active_cycle(configuration_id).await? else {
            return Err(VigilError::invalid(format!(
                "configuration {configuration_id} has no active cycle"
            )));
        };
        if is_overdue(&current, &configuration, now) {
            warn!(
                configuration = %configuration_id,
                cycle = %current.id,
                "check-in after grace period rejected"
            );
            return Err(VigilError::invalid(format!(
                "cycle {} is overdue; release may already be under way",
                current.id
            )));
        }

        if !self.cycles.mark_checked_in(&current, now).await? {
            return Err(VigilError::invalid(format!(
                "cycle {} is no longer active",
                current.id
            )));
        }
        let next = self
            .cycles
            .open_cycle(&configuration, Some(&current), now)
            .await?;
        info!(
            configuration = %configuration_id,
            sequence = next.sequence,
            deadline = %next.next_checkin_deadline,
            "checked in"
        );

        self.audit
            .record(
                AuditRecord::for_owner(
                    configuration.owner_id,
                    AuditAction::CheckIn,
                    AuditResource::Cycle {
                        configuration_id,
                        cycle_id: current.id,
                    },
                    AuditOutcome::Success,
                    now,
                )
                .with_metadata(serde_json::json!({
                    "closed_sequence": current.sequence,
                    "next_cycle": next.id,
                    "next_deadline": next.next_checkin_deadline,
                })),
            )
            .await;
        Ok(next)
    }

    /// Time left before the active cycle becomes overdue.
    pub async fn remaining_grace(&self, configuration_id: ConfigurationId) -> VigilResult<u64> {
        let now = self.effects.physical_time().await?;
        let configuration = self.cycles.configuration(configuration_id).await?;
        let current = self
            .cycles
            .active_cycle(configuration_id)
            .await?
            .ok_or_else(|| {
                VigilError::invalid(format!(
                    "configuration {configuration_id} has no active cycle"
                ))
            })?;
        Ok(remaining_grace_ms(&current, &configuration, now))
    }

    fn lease(&self, configuration_id: ConfigurationId) -> VigilResult<ConfigurationLease<'_>> {
        self.locks.try_acquire(configuration_id).ok_or_else(|| {
            VigilError::invalid(format!(
                "configuration {configuration_id} is being released"
            ))
        })
    }
}
