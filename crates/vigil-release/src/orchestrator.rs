//! Release orchestrator.
//!
//! Drives the two state machines the engine owns:
//!
//! - cycles: `Active -> Overdue`
//! - protected messages: `Scheduled -> Sent` or `Scheduled -> Failed`
//!
//! One invocation walks every configuration, releases those whose grace period
//! lapsed (or all active ones when forced) and reports what happened. Every
//! state change is a conditional write, so two invocations racing on the same
//! record cannot both win. Configurations are processed concurrently up to
//! [`OrchestratorConfig::concurrency`]; within a configuration all I/O is
//! sequential.

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use vigil_core::effects::{ReleaseEffects, StoreError};
use vigil_core::{
    AuditAction, AuditOutcome, AuditRecord, AuditResource, CheckInConfiguration, ConfigurationId,
    MessageStatus, ProtectedMessage, RecipientId, Timestamp, VigilError, VigilResult, SERVICE_ACTOR,
};

use crate::audit::AuditSink;
use crate::cycle_store::CycleStore;
use crate::overdue::{grace_deadline, is_overdue};
use crate::render::render_release_email;

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Configurations processed at once
    pub concurrency: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

/// What started an invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseTrigger {
    /// Release every active cycle regardless of its deadline
    pub forced: bool,
    /// Free-form origin copied onto audit records (e.g. client address)
    pub origin: Option<String>,
}

impl ReleaseTrigger {
    pub fn scheduled() -> Self {
        Self {
            forced: false,
            origin: Some("scheduler".to_string()),
        }
    }
}

/// Counts for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseReport {
    pub configurations_evaluated: usize,
    /// Configurations whose cycle was released, forced or not
    pub released_configurations: usize,
    /// Subset of `released_configurations` released by force
    pub emergency_releases: usize,
    pub messages_released: usize,
    pub messages_failed: usize,
    pub deliveries_succeeded: usize,
    pub deliveries_failed: usize,
    pub configuration_failures: usize,
    /// Configurations skipped because another invocation held them
    pub skipped_busy: usize,
}

impl ReleaseReport {
    fn merge(&mut self, other: ReleaseReport) {
        self.configurations_evaluated += other.configurations_evaluated;
        self.released_configurations += other.released_configurations;
        self.emergency_releases += other.emergency_releases;
        self.messages_released += other.messages_released;
        self.messages_failed += other.messages_failed;
        self.deliveries_succeeded += other.deliveries_succeeded;
        self.deliveries_failed += other.deliveries_failed;
        self.configuration_failures += other.configuration_failures;
        self.skipped_busy += other.skipped_busy;
    }
}

/// Set of configurations currently being worked in this process.
#[derive(Debug, Default)]
pub struct ConfigurationLocks {
    held: Mutex<HashSet<ConfigurationId>>,
}

impl ConfigurationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`, or `None` if it is already held.
    pub fn try_acquire(&self, id: ConfigurationId) -> Option<ConfigurationLease<'_>> {
        if self.held.lock().insert(id) {
            Some(ConfigurationLease { locks: self, id })
        } else {
            None
        }
    }

    pub fn is_held(&self, id: ConfigurationId) -> bool {
        self.held.lock().contains(&id)
    }
}

/// Releases its configuration when dropped.
#[derive(Debug)]
pub struct ConfigurationLease<'a> {
    locks: &'a ConfigurationLocks,
    id: ConfigurationId,
}

impl Drop for ConfigurationLease<'_> {
    fn drop(&mut self) {
        self.locks.held.lock().remove(&self.id);
    }
}

pub struct ReleaseOrchestrator<E> {
    effects: Arc<E>,
    cycles: CycleStore<Arc<E>>,
    audit: AuditSink<Arc<E>>,
    locks: Arc<ConfigurationLocks>,
    config: OrchestratorConfig,
}

impl<E: ReleaseEffects> ReleaseOrchestrator<E> {
    pub fn new(effects: Arc<E>, config: OrchestratorConfig) -> Self {
        Self {
            cycles: CycleStore::new(effects.clone()),
            audit: AuditSink::new(effects.clone()),
            effects,
            locks: Arc::new(ConfigurationLocks::new()),
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Shared with the check-in service so owners cannot check in mid-release.
    pub fn locks(&self) -> Arc<ConfigurationLocks> {
        self.locks.clone()
    }

    /// One pass over every configuration.
    ///
    /// Fails only when the clock or the configuration listing is unavailable,
    /// in which case nothing has been mutated. Errors inside a single
    /// configuration are audited and counted instead.
    pub async fn run(&self, trigger: &ReleaseTrigger) -> VigilResult<ReleaseReport> {
        let now = self.effects.physical_time().await?;

        let configurations = self.cycles.list_configurations().await.map_err(|err| {
            error!(error = %err, "failed to list check-in configurations");
            VigilError::from(err)
        })?;

        debug!(
            configurations = configurations.len(),
            forced = trigger.forced,
            "starting release pass"
        );

        let concurrency = self.config.concurrency.max(1);
        let partials: Vec<ReleaseReport> = stream::iter(configurations)
            .map(|configuration| self.process_configuration(configuration, trigger, now))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut report = ReleaseReport::default();
        for partial in partials {
            report.merge(partial);
        }

        info!(
            evaluated = report.configurations_evaluated,
            released = report.released_configurations,
            emergency = report.emergency_releases,
            messages = report.messages_released,
            deliveries_failed = report.deliveries_failed,
            failures = report.configuration_failures,
            "release pass complete"
        );
        Ok(report)
    }

    async fn process_configuration(
        &self,
        configuration: CheckInConfiguration,
        trigger: &ReleaseTrigger,
        now: Timestamp,
    ) -> ReleaseReport {
        let mut report = ReleaseReport {
            configurations_evaluated: 1,
            ..Default::default()
        };

        let Some(_lease) = self.locks.try_acquire(configuration.id) else {
            debug!(configuration = %configuration.id, "configuration busy; skipping");
            report.skipped_busy = 1;
            return report;
        };

        if let Err(err) = self
            .release_configuration(&configuration, trigger, now, &mut report)
            .await
        {
            report.configuration_failures += 1;
            error!(
                configuration = %configuration.id,
                error = %err,
                "configuration processing failed"
            );
            let record = AuditRecord::new(
                SERVICE_ACTOR,
                AuditAction::ConfigurationFailure,
                AuditResource::Configuration {
                    configuration_id: configuration.id,
                },
                AuditOutcome::Failed,
                now,
            )
            .with_metadata(serde_json::json!({ "error": err.to_string() }))
            .with_origin(trigger.origin.clone());
            self.audit.record(record).await;
        }

        report
    }

    async fn release_configuration(
        &self,
        configuration: &CheckInConfiguration,
        trigger: &ReleaseTrigger,
        now: Timestamp,
        report: &mut ReleaseReport,
    ) -> Result<(), StoreError> {
        let Some(cycle) = self.cycles.latest_cycle(configuration.id).await? else {
            return Ok(());
        };
        if !cycle.is_active() {
            return Ok(());
        }

        let overdue = is_overdue(&cycle, configuration, now);
        if !(trigger.forced || overdue) {
            return Ok(());
        }

        let (actor, action) = if trigger.forced {
            (SERVICE_ACTOR.to_string(), AuditAction::EmergencyRelease)
        } else {
            (
                configuration.owner_id.to_string(),
                AuditAction::OverdueRelease,
            )
        };
        info!(
            configuration = %configuration.id,
            cycle = %cycle.id,
            sequence = cycle.sequence,
            %action,
            "releasing protected messages"
        );

        // Intent is recorded before any side effect.
        let intent = AuditRecord::new(
            actor,
            action,
            AuditResource::Cycle {
                configuration_id: configuration.id,
                cycle_id: cycle.id,
            },
            AuditOutcome::Success,
            now,
        )
        .with_metadata(serde_json::json!({
            "owner_id": configuration.owner_id,
            "sequence": cycle.sequence,
            "deadline": cycle.next_checkin_deadline,
            "grace_deadline": grace_deadline(&cycle, configuration),
            "overdue": overdue,
        }))
        .with_origin(trigger.origin.clone());
        self.audit.record(intent).await;

        let messages = self
            .effects
            .list_releasable_messages(configuration.owner_id)
            .await?;

        for message in messages.into_iter().filter(ProtectedMessage::is_releasable) {
            self.release_message(&message, trigger, now, report).await?;
        }

        if !self.cycles.mark_overdue(&cycle, now).await? {
            debug!(cycle = %cycle.id, "cycle already left ACTIVE");
        }

        report.released_configurations += 1;
        if trigger.forced {
            report.emergency_releases += 1;
        }
        Ok(())
    }

    async fn release_message(
        &self,
        message: &ProtectedMessage,
        trigger: &ReleaseTrigger,
        now: Timestamp,
        report: &mut ReleaseReport,
    ) -> Result<(), StoreError> {
        let recipients = match self
            .effects
            .resolve_recipients(message.owner_id, &message.recipient_ids)
            .await
        {
            Ok(recipients) if !recipients.is_empty() => recipients,
            Ok(_) => {
                return self
                    .fail_message(message, "no deliverable recipients", trigger, now, report)
                    .await;
            }
            Err(err) => {
                warn!(message = %message.id, error = %err, "recipient resolution failed");
                let reason = format!("recipient resolution failed: {err}");
                return self
                    .fail_message(message, &reason, trigger, now, report)
                    .await;
            }
        };

        let claimed = self
            .effects
            .transition_message(
                message.id,
                MessageStatus::Scheduled,
                MessageStatus::Sent,
                Some(now),
            )
            .await?;
        if !claimed {
            debug!(message = %message.id, "message claimed by another invocation; skipping");
            return Ok(());
        }
        report.messages_released += 1;

        for missing in message
            .recipient_ids
            .iter()
            .filter(|id| !recipients.iter().any(|r| r.id == **id))
        {
            report.deliveries_failed += 1;
            warn!(message = %message.id, recipient = %missing, "recipient not found");
            self.record_delivery(
                message,
                *missing,
                AuditOutcome::Failed,
                serde_json::json!({ "error": "recipient not found" }),
                trigger,
                now,
            )
            .await;
        }

        for recipient in &recipients {
            let email = render_release_email(message, recipient);
            match self.effects.send_email(email).await {
                Ok(receipt) => {
                    report.deliveries_succeeded += 1;
                    debug!(
                        message = %message.id,
                        recipient = %recipient.id,
                        provider_id = %receipt.message_id,
                        "delivered"
                    );
                    self.record_delivery(
                        message,
                        recipient.id,
                        AuditOutcome::Success,
                        serde_json::json!({ "provider_message_id": receipt.message_id }),
                        trigger,
                        now,
                    )
                    .await;
                }
                Err(err) => {
                    report.deliveries_failed += 1;
                    warn!(
                        message = %message.id,
                        recipient = %recipient.id,
                        error = %err,
                        "delivery failed"
                    );
                    self.record_delivery(
                        message,
                        recipient.id,
                        AuditOutcome::Failed,
                        serde_json::json!({ "error": err.to_string() }),
                        trigger,
                        now,
                    )
                    .await;
                }
            }
        }
        Ok(())
    }

    async fn fail_message(
        &self,
        message: &ProtectedMessage,
        reason: &str,
        trigger: &ReleaseTrigger,
        now: Timestamp,
        report: &mut ReleaseReport,
    ) -> Result<(), StoreError> {
        let moved = self
            .effects
            .transition_message(
                message.id,
                MessageStatus::Scheduled,
                MessageStatus::Failed,
                None,
            )
            .await?;
        if !moved {
            debug!(message = %message.id, "message claimed by another invocation; skipping");
            return Ok(());
        }
        report.messages_failed += 1;
        warn!(message = %message.id, reason, "message release failed");

        let record = AuditRecord::for_owner(
            message.owner_id,
            AuditAction::MessageReleaseFailed,
            AuditResource::Message {
                message_id: message.id,
            },
            AuditOutcome::Failed,
            now,
        )
        .with_metadata(serde_json::json!({ "error": reason }))
        .with_origin(trigger.origin.clone());
        self.audit.record(record).await;
        Ok(())
    }

    async fn record_delivery(
        &self,
        message: &ProtectedMessage,
        recipient_id: RecipientId,
        outcome: AuditOutcome,
        metadata: serde_json::Value,
        trigger: &ReleaseTrigger,
        now: Timestamp,
    ) {
        let record = AuditRecord::for_owner(
            message.owner_id,
            AuditAction::MessageDelivery,
            AuditResource::Delivery {
                message_id: message.id,
                recipient_id,
            },
            outcome,
            now,
        )
        .with_metadata(metadata)
        .with_origin(trigger.origin.clone());
        self.audit.record(record).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_is_exclusive_and_released_on_drop() {
        let locks = ConfigurationLocks::new();
        let id = ConfigurationId::from_u128(1);
        let lease = locks.try_acquire(id);
        assert!(lease.is_some());
        assert!(locks.is_held(id));
        assert!(locks.try_acquire(id).is_none());
        assert!(locks.try_acquire(ConfigurationId::from_u128(2)).is_some());
        drop(lease);
        assert!(!locks.is_held(id));
        assert!(locks.try_acquire(id).is_some());
    }

    #[test]
    fn test_report_merge_sums_fields() {
        let mut total = ReleaseReport::default();
        total.merge(ReleaseReport {
            configurations_evaluated: 1,
            released_configurations: 1,
            messages_released: 2,
            deliveries_succeeded: 3,
            ..Default::default()
        });
        total.merge(ReleaseReport {
            configurations_evaluated: 1,
            skipped_busy: 1,
            ..Default::default()
        });
        assert_eq!(total.configurations_evaluated, 2);
        assert_eq!(total.released_configurations, 1);
        assert_eq!(total.messages_released, 2);
        assert_eq!(total.deliveries_succeeded, 3);
        assert_eq!(total.skipped_busy, 1);
    }
}
