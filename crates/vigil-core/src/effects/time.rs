//! Wall-clock time effect.
//!
//! # Effect Classification
//!
//! - **Category**: Infrastructure Effect
//! - **Implementation**: `vigil-effects` (`RealTimeHandler`), `vigil-testkit` (`ControllableClock`)
//! - **Usage**: Overdue evaluation, audit timestamps, cycle deadlines
//!
//! The engine never reads the system clock directly so that overdue decisions
//! are reproducible under test.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// Error type for time operations.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum TimeError {
    #[error("Clock unavailable: {reason}")]
    ClockUnavailable { reason: String },
    #[error("Time service unavailable")]
    ServiceUnavailable,
}

#[async_trait]
pub trait PhysicalTimeEffects: Send + Sync {
    /// Current wall-clock time.
    async fn physical_time(&self) -> Result<Timestamp, TimeError>;

    /// Current time in milliseconds, or the epoch when the clock is unavailable.
    async fn current_timestamp_ms(&self) -> u64 {
        self.physical_time()
            .await
            .map(Timestamp::as_millis)
            .unwrap_or(0)
    }
}

/// Blanket implementation for Arc<T> where T: PhysicalTimeEffects
#[async_trait]
impl<T: PhysicalTimeEffects + ?Sized> PhysicalTimeEffects for std::sync::Arc<T> {
    async fn physical_time(&self) -> Result<Timestamp, TimeError> {
        (**self).physical_time().await
    }
}
