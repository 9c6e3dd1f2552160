//! Release engine entry point.
//!
//! `process` is what external triggers call: it applies admission control
//! (rate limit, then authorization for forced releases) before handing off to
//! the orchestrator. Forced releases turned away at either step leave one
//! failed audit record. `run_scheduled` is the in-process trigger and skips
//! admission entirely.

use std::sync::Arc;
use tracing::{info, warn};
use vigil_core::effects::ReleaseEffects;
use vigil_core::{
    AuditAction, AuditOutcome, AuditRecord, AuditResource, Timestamp, VigilError, VigilResult,
    SERVICE_ACTOR,
};

use crate::audit::AuditSink;
use crate::check_in::CheckInService;
use crate::guard::{AuthorizationGuard, Denial};
use crate::orchestrator::{OrchestratorConfig, ReleaseOrchestrator, ReleaseReport, ReleaseTrigger};
use crate::rate_limit::{CallerKey, RateLimitConfig, RateLimiter};

/// Endpoint name recorded on admission audit rows.
pub const PROCESS_ENDPOINT: &str = "process";

/// Errors returned by [`ReleaseEngine::process`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReleaseError {
    /// Caller exceeded its request budget; nothing was done
    #[error("rate limit exceeded")]
    RateLimited,
    /// Forced release without a valid credential; one audit row was written
    #[error("unauthorized forced release ({0})")]
    Unauthorized(Denial),
    /// The pass could not start; safe to retry
    #[error(transparent)]
    Fatal(#[from] VigilError),
}

/// One external invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    pub caller: CallerKey,
    pub emergency_release: bool,
    /// Bearer credential, only consulted for emergency releases
    pub credential: Option<String>,
    pub origin: Option<String>,
}

impl ProcessRequest {
    pub fn routine(caller: CallerKey) -> Self {
        Self {
            caller,
            emergency_release: false,
            credential: None,
            origin: None,
        }
    }

    pub fn emergency(caller: CallerKey, credential: Option<String>) -> Self {
        Self {
            caller,
            emergency_release: true,
            credential,
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

pub struct ReleaseEngine<E> {
    effects: Arc<E>,
    orchestrator: ReleaseOrchestrator<E>,
    limiter: RateLimiter,
    guard: AuthorizationGuard,
    audit: AuditSink<Arc<E>>,
}

impl<E: ReleaseEffects> ReleaseEngine<E> {
    /// Engine with default limits and no service credential.
    pub fn new(effects: Arc<E>) -> Self {
        Self {
            orchestrator: ReleaseOrchestrator::new(effects.clone(), OrchestratorConfig::default()),
            limiter: RateLimiter::default(),
            guard: AuthorizationGuard::default(),
            audit: AuditSink::new(effects.clone()),
            effects,
        }
    }

    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.limiter = RateLimiter::new(config);
        self
    }

    pub fn with_orchestrator_config(mut self, config: OrchestratorConfig) -> Self {
        self.orchestrator = ReleaseOrchestrator::new(self.effects.clone(), config);
        self
    }

    pub fn with_service_credential(mut self, credential: Option<String>) -> Self {
        self.guard = AuthorizationGuard::new(credential);
        self
    }

    pub fn effects(&self) -> &Arc<E> {
        &self.effects
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Check-in operations sharing this engine's configuration locks.
    pub fn check_in_service(&self) -> CheckInService<E> {
        CheckInService::new(self.effects.clone(), self.orchestrator.locks())
    }

    /// Admit the request, then run one release pass.
    pub async fn process(&self, request: ProcessRequest) -> Result<ReleaseReport, ReleaseError> {
        if !self.limiter.allow(&request.caller) {
            warn!(
                caller = %request.caller,
                forced = request.emergency_release,
                "process request rate limited"
            );
            if request.emergency_release {
                self.audit_admission(
                    &request,
                    AuditAction::RateLimitedForcedRelease,
                    serde_json::json!({ "caller": request.caller.as_str() }),
                )
                .await;
            }
            return Err(ReleaseError::RateLimited);
        }

        if request.emergency_release {
            if let Err(denial) = self
                .guard
                .authorize_forced_release(request.credential.as_deref())
            {
                warn!(caller = %request.caller, reason = %denial, "forced release denied");
                self.audit_admission(
                    &request,
                    AuditAction::UnauthorizedForcedRelease,
                    serde_json::json!({
                        "caller": request.caller.as_str(),
                        "reason": denial,
                    }),
                )
                .await;
                return Err(ReleaseError::Unauthorized(denial));
            }
            info!(caller = %request.caller, "forced release authorized");
        }

        let trigger = ReleaseTrigger {
            forced: request.emergency_release,
            origin: request
                .origin
                .or_else(|| Some(request.caller.to_string())),
        };
        Ok(self.orchestrator.run(&trigger).await?)
    }

    /// Routine pass from the in-process scheduler.
    pub async fn run_scheduled(&self) -> VigilResult<ReleaseReport> {
        self.orchestrator.run(&ReleaseTrigger::scheduled()).await
    }

    /// One failed record for a forced release turned away at admission.
    async fn audit_admission(
        &self,
        request: &ProcessRequest,
        action: AuditAction,
        metadata: serde_json::Value,
    ) {
        let now = Timestamp::from_millis(self.effects.current_timestamp_ms().await);
        let record = AuditRecord::new(
            SERVICE_ACTOR,
            action,
            AuditResource::Endpoint {
                name: PROCESS_ENDPOINT.to_string(),
            },
            AuditOutcome::Failed,
            now,
        )
        .with_metadata(metadata)
        .with_origin(
            request
                .origin
                .clone()
                .or_else(|| Some(request.caller.to_string())),
        );
        self.audit.record(record).await;
    }
}
