//! Controllable clock for deterministic overdue tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use vigil_core::effects::{PhysicalTimeEffects, TimeError};
use vigil_core::{Span, Timestamp};

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ControllableClock {
    current_ms: Arc<Mutex<u64>>,
    unavailable: Arc<Mutex<bool>>,
}

impl ControllableClock {
    /// Start at `initial_ms` milliseconds since the epoch.
    pub fn new(initial_ms: u64) -> Self {
        Self {
            current_ms: Arc::new(Mutex::new(initial_ms)),
            unavailable: Arc::new(Mutex::new(false)),
        }
    }

    pub fn now(&self) -> Timestamp {
        Timestamp::from_millis(*self.current_ms.lock())
    }

    pub fn set(&self, timestamp: Timestamp) {
        *self.current_ms.lock() = timestamp.as_millis();
    }

    pub fn advance_ms(&self, ms: u64) {
        let mut current = self.current_ms.lock();
        *current = current.saturating_add(ms);
    }

    pub fn advance(&self, span: Span) {
        self.advance_ms(span.as_millis());
    }

    /// Make `physical_time` fail until [`ControllableClock::restore`].
    pub fn break_clock(&self) {
        *self.unavailable.lock() = true;
    }

    pub fn restore(&self) {
        *self.unavailable.lock() = false;
    }
}

impl Default for ControllableClock {
    /// 2024-01-01T00:00:00Z
    fn default() -> Self {
        Self::new(1_704_067_200_000)
    }
}

#[async_trait]
impl PhysicalTimeEffects for ControllableClock {
    async fn physical_time(&self) -> Result<Timestamp, TimeError> {
        if *self.unavailable.lock() {
            return Err(TimeError::ClockUnavailable {
                reason: "clock disabled by test".to_string(),
            });
        }
        Ok(self.now())
    }
}
