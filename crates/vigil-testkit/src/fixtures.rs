//! Scenario fixtures.
//!
//! [`TestHarness`] owns one of each double and assembles them into a
//! [`ReleaseEffectSystem`]; [`ConfigurationBuilder`] seeds a configuration
//! with its current cycle, messages and recipients relative to the clock.

use std::sync::Arc;
use vigil_core::{
    CheckInConfiguration, CheckInCycle, ConfigurationId, CycleState, MessageId, MessageScope,
    MessageStatus, OwnerId, ProtectedMessage, Recipient, RecipientId, Span, Timestamp,
};
use vigil_effects::{MemoryReleaseStore, ReleaseEffectSystem};

use crate::dispatch::ScriptedDispatch;
use crate::store::{FaultyStore, StoreFaults};
use crate::time::ControllableClock;

/// Clock, store, fault switchboard and dispatcher for one test.
#[derive(Debug, Clone, Default)]
pub struct TestHarness {
    pub clock: ControllableClock,
    pub store: MemoryReleaseStore,
    pub faults: StoreFaults,
    pub dispatch: ScriptedDispatch,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(initial_ms: u64) -> Self {
        Self {
            clock: ControllableClock::new(initial_ms),
            ..Self::default()
        }
    }

    /// Effect system wired to this harness' doubles.
    pub fn effects(&self) -> Arc<ReleaseEffectSystem> {
        let store = Arc::new(FaultyStore::new(self.store.clone(), self.faults.clone()));
        Arc::new(ReleaseEffectSystem::new(
            Arc::new(self.clock.clone()),
            store.clone(),
            store,
            Arc::new(self.dispatch.clone()),
        ))
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Start seeding a configuration owned by a fresh owner.
    pub fn configuration(&self) -> ConfigurationBuilder<'_> {
        ConfigurationBuilder::new(self)
    }
}

/// Everything [`ConfigurationBuilder::seed`] wrote to the store.
#[derive(Debug, Clone)]
pub struct SeededConfiguration {
    pub configuration: CheckInConfiguration,
    pub cycle: Option<CheckInCycle>,
    pub messages: Vec<ProtectedMessage>,
    pub recipients: Vec<Recipient>,
}

impl SeededConfiguration {
    pub fn owner_id(&self) -> OwnerId {
        self.configuration.owner_id
    }

    pub fn id(&self) -> ConfigurationId {
        self.configuration.id
    }

    /// The seeded cycle. Panics if the builder was told to skip it.
    pub fn cycle(&self) -> &CheckInCycle {
        self.cycle.as_ref().expect("configuration seeded without a cycle")
    }

    pub fn message(&self) -> &ProtectedMessage {
        self.messages.first().expect("configuration seeded without messages")
    }
}

pub struct ConfigurationBuilder<'a> {
    harness: &'a TestHarness,
    owner_id: OwnerId,
    frequency: Span,
    grace: Span,
    deadline_offset_ms: i64,
    cycle_state: Option<CycleState>,
    sequence: u64,
    expires_at: Option<Timestamp>,
    recipients: usize,
    messages: usize,
    unprotected_messages: usize,
}

impl<'a> ConfigurationBuilder<'a> {
    fn new(harness: &'a TestHarness) -> Self {
        Self {
            harness,
            owner_id: OwnerId::new(),
            frequency: Span::days(7),
            grace: Span::days(1),
            deadline_offset_ms: Span::days(7).as_millis() as i64,
            cycle_state: Some(CycleState::Active),
            sequence: 1,
            expires_at: None,
            recipients: 1,
            messages: 1,
            unprotected_messages: 0,
        }
    }

    pub fn owner(mut self, owner_id: OwnerId) -> Self {
        self.owner_id = owner_id;
        self
    }

    pub fn frequency(mut self, frequency: Span) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn grace(mut self, grace: Span) -> Self {
        self.grace = grace;
        self
    }

    /// Current deadline lies `span` in the past.
    pub fn deadline_ago(mut self, span: Span) -> Self {
        self.deadline_offset_ms = -(span.as_millis() as i64);
        self
    }

    /// Current deadline lies `span` in the future.
    pub fn deadline_in(mut self, span: Span) -> Self {
        self.deadline_offset_ms = span.as_millis() as i64;
        self
    }

    /// Deadline at an exact millisecond offset from now.
    pub fn deadline_offset_ms(mut self, offset: i64) -> Self {
        self.deadline_offset_ms = offset;
        self
    }

    pub fn cycle_state(mut self, state: CycleState) -> Self {
        self.cycle_state = Some(state);
        self
    }

    pub fn sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn without_cycle(mut self) -> Self {
        self.cycle_state = None;
        self
    }

    pub fn expires_at(mut self, expires_at: Timestamp) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn recipients(mut self, count: usize) -> Self {
        self.recipients = count;
        self
    }

    pub fn messages(mut self, count: usize) -> Self {
        self.messages = count;
        self
    }

    /// Extra `Normal`-scope scheduled messages the engine must ignore.
    pub fn unprotected_messages(mut self, count: usize) -> Self {
        self.unprotected_messages = count;
        self
    }

    pub async fn seed(self) -> SeededConfiguration {
        let store = &self.harness.store;
        let now = self.harness.now();

        let configuration = CheckInConfiguration {
            id: ConfigurationId::new(),
            owner_id: self.owner_id,
            frequency: self.frequency,
            grace_duration: self.grace.amount,
            grace_unit: self.grace.unit,
            created_at: now.saturating_sub_ms(self.frequency.as_millis()),
            expires_at: self.expires_at,
        };
        store.put_configuration(configuration.clone()).await;

        let cycle = match self.cycle_state {
            Some(state) => {
                let deadline = if self.deadline_offset_ms >= 0 {
                    now.saturating_add_ms(self.deadline_offset_ms as u64)
                } else {
                    now.saturating_sub_ms(self.deadline_offset_ms.unsigned_abs())
                };
                let mut cycle = CheckInCycle::active(configuration.id, self.sequence, deadline);
                cycle.state = state;
                store.put_cycle(cycle.clone()).await;
                Some(cycle)
            }
            None => None,
        };

        let mut recipients = Vec::with_capacity(self.recipients);
        for i in 0..self.recipients {
            let recipient = recipient(self.owner_id, i);
            store.put_recipient(recipient.clone()).await;
            recipients.push(recipient);
        }
        let recipient_ids: Vec<RecipientId> = recipients.iter().map(|r| r.id).collect();

        let mut messages = Vec::with_capacity(self.messages);
        for i in 0..self.messages {
            let message = protected_message(self.owner_id, i, recipient_ids.clone());
            store.put_message(message.clone()).await;
            messages.push(message);
        }
        for i in 0..self.unprotected_messages {
            let mut message = protected_message(self.owner_id, i, recipient_ids.clone());
            message.scope = MessageScope::Normal;
            message.title = format!("Scheduled note {i}");
            store.put_message(message).await;
        }

        SeededConfiguration {
            configuration,
            cycle,
            messages,
            recipients,
        }
    }
}

/// Recipient `index` of `owner`, with a unique address.
pub fn recipient(owner_id: OwnerId, index: usize) -> Recipient {
    let id = RecipientId::new();
    Recipient {
        id,
        owner_id,
        display_name: format!("Recipient {index}"),
        email: format!("recipient{index}-{}@example.com", id.uuid().simple()),
    }
}

/// Scheduled protected message addressed to `recipient_ids`.
pub fn protected_message(
    owner_id: OwnerId,
    index: usize,
    recipient_ids: Vec<RecipientId>,
) -> ProtectedMessage {
    ProtectedMessage {
        id: MessageId::new(),
        owner_id,
        title: format!("Letter {index}"),
        body: format!("If you are reading this, letter {index} was released."),
        recipient_ids,
        scope: MessageScope::Protected,
        status: MessageStatus::Scheduled,
        sent_at: None,
    }
}
