//! Time effect handler - production only
//!
//! Stateless implementation of `PhysicalTimeEffects` delegating to the system
//! clock. Controllable clocks for tests live in `vigil-testkit`.

use async_trait::async_trait;
use std::time::{SystemTime, UNIX_EPOCH};
use vigil_core::effects::{PhysicalTimeEffects, TimeError};
use vigil_core::Timestamp;

/// Real time handler for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeHandler;

impl RealTimeHandler {
    /// Create a new real time handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PhysicalTimeEffects for RealTimeHandler {
    async fn physical_time(&self) -> Result<Timestamp, TimeError> {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| TimeError::ClockUnavailable {
                reason: format!("system clock before Unix epoch: {e}"),
            })?;
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        Ok(Timestamp::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_physical_time_is_monotonic_enough() {
        let handler = RealTimeHandler::new();
        let first = handler.current_timestamp_ms().await;

        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = handler.current_timestamp_ms().await;
        assert!(second >= first);
        assert!(first > 0);
    }
}
