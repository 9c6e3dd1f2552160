//! # Vigil Effects - production handlers
//!
//! Stateless and in-memory implementations of the effect traits defined in
//! `vigil-core`:
//!
//! - `RealTimeHandler`: system clock
//! - `MemoryReleaseStore`: configurations, cycles, messages, recipients and audit
//!   rows in process memory, optionally seeded from a JSON snapshot
//! - `LogDispatchHandler` / `HttpDispatchHandler`: email dispatch
//! - `ReleaseEffectSystem`: the composite handed to the release engine
//!
//! Controllable and fault-injecting doubles live in `vigil-testkit`.

#![allow(missing_docs)]
#![forbid(unsafe_code)]

pub mod dispatch;
pub mod store;
pub mod system;
pub mod time;

pub use dispatch::{HttpDispatchConfig, HttpDispatchHandler, LogDispatchHandler};
pub use store::{MemoryReleaseStore, StoreSnapshot};
pub use system::ReleaseEffectSystem;
pub use time::RealTimeHandler;
