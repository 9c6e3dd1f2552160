//! # Vigil Server
//!
//! Deployment surface for the release engine: the `POST /process` endpoint,
//! the in-process scheduler, TOML configuration and bootstrap wiring. The
//! `vigil` binary in `main.rs` is a thin clap front end over this crate.

#![allow(missing_docs)]
#![forbid(unsafe_code)]

pub mod api;
pub mod app;
pub mod config;
pub mod scheduler;

pub use api::{router, serve, ApiError, ProcessResponse};
pub use app::{App, BootstrapError};
pub use config::{ConfigError, DispatchMode, Secret, VigilConfig};
pub use scheduler::{ReleaseScheduler, SchedulerHandle};
