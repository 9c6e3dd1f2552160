//! # Vigil Release - check-in release engine
//!
//! Decides, for every check-in configuration, whether the owner missed their
//! deadline plus grace period and, if so, releases their protected messages to
//! every recipient exactly once, auditing each decision.
//!
//! ## Components
//! - [`rate_limit`]: sliding-window admission per caller
//! - [`guard`]: service credential check for forced releases
//! - [`overdue`]: pure grace-period evaluation
//! - [`cycle_store`]: cycle lookups and conditional transitions
//! - [`orchestrator`]: the release pass
//! - [`audit`]: audit writes with a process-log fallback
//! - [`engine`]: admission plus orchestration, the single entry point
//! - [`check_in`]: owner-side activation and check-in

#![allow(missing_docs)]
#![forbid(unsafe_code)]

pub mod audit;
pub mod check_in;
pub mod cycle_store;
pub mod engine;
pub mod guard;
pub mod orchestrator;
pub mod overdue;
pub mod rate_limit;
pub mod render;

pub use audit::{AuditSink, AUDIT_FALLBACK_TARGET};
pub use check_in::CheckInService;
pub use cycle_store::CycleStore;
pub use engine::{ProcessRequest, ReleaseEngine, ReleaseError};
pub use guard::{AuthorizationGuard, Denial};
pub use orchestrator::{
    ConfigurationLocks, OrchestratorConfig, ReleaseOrchestrator, ReleaseReport, ReleaseTrigger,
};
pub use overdue::{grace_deadline, is_overdue};
pub use rate_limit::{CallerKey, RateLimitConfig, RateLimiter};
pub use render::render_release_email;
