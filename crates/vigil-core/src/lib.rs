//! Vigil Core - domain model and effect interfaces
//!
//! Types and pure effect traits shared by the release engine, its production
//! handlers and its test doubles. Contains no I/O.
//!
//! ## Domain
//! - `CheckInConfiguration` / `CheckInCycle`: the owner's protection settings
//!   and the deadline-to-deadline intervals derived from them
//! - `ProtectedMessage` / `Recipient`: content released when a cycle lapses
//! - `AuditRecord`: append-only trail of every security-relevant decision
//!
//! ## Effects
//! - `PhysicalTimeEffects`, `ReleaseStore`, `AuditStore`, `EmailDispatchEffects`
//! - `ReleaseEffects`: the composite bound used by the engine

#![allow(missing_docs)]
#![forbid(unsafe_code)]

/// Pure effect interfaces (no implementations)
pub mod effects;

/// Unified error handling
pub mod errors;

/// Timestamps and calendar units
pub mod time;

/// Domain records
pub mod types;

pub use errors::{Result as VigilResult, VigilError};
pub use time::{Span, TimeUnit, Timestamp};
pub use types::*;
