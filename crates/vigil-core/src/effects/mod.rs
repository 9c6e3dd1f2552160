//! Pure effect interfaces (no implementations)
//!
//! The release engine talks to the outside world only through these traits:
//!
//! - `PhysicalTimeEffects`: wall clock
//! - `ReleaseStore`: configurations, cycles, messages, recipients
//! - `AuditStore`: append-only audit rows
//! - `EmailDispatchEffects`: per-recipient email send
//!
//! `ReleaseEffects` bounds exactly the set the engine needs so tests can plug in
//! a composite of controllable handlers.

pub mod audit;
pub mod dispatch;
pub mod store;
pub mod time;

pub use audit::AuditStore;
pub use dispatch::{DispatchError, DispatchReceipt, EmailDispatchEffects, EmailRequest};
pub use store::{ReleaseStore, StoreError};
pub use time::{PhysicalTimeEffects, TimeError};

/// Composed effects required by the release engine and check-in service.
pub trait ReleaseEffects:
    PhysicalTimeEffects + ReleaseStore + AuditStore + EmailDispatchEffects + Send + Sync
{
}

/// Blanket implementation for any type that implements all required traits.
impl<T> ReleaseEffects for T where
    T: PhysicalTimeEffects + ReleaseStore + AuditStore + EmailDispatchEffects + Send + Sync
{
}
