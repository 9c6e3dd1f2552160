//! Vigil testing infrastructure
//!
//! Controllable and fault-injecting effect handlers plus scenario fixtures for
//! release engine and HTTP tests.
//!
//! ```toml
//! [dev-dependencies]
//! vigil-testkit = { path = "../vigil-testkit" }
//! ```

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![forbid(unsafe_code)]

pub mod dispatch;
pub mod fixtures;
pub mod store;
pub mod time;

pub use dispatch::ScriptedDispatch;
pub use fixtures::{
    protected_message, recipient, ConfigurationBuilder, SeededConfiguration, TestHarness,
};
pub use store::{FaultyStore, StoreFaults};
pub use time::ControllableClock;
