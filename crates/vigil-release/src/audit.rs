//! Audit sink with a local fallback.
//!
//! Audit writes must never stop a release. When the audit store rejects a
//! record, the full record goes to the process log at `error` level under the
//! `vigil::audit_fallback` target instead.

use vigil_core::effects::AuditStore;
use vigil_core::AuditRecord;

/// Log target carrying records the audit store could not accept.
pub const AUDIT_FALLBACK_TARGET: &str = "vigil::audit_fallback";

/// Wraps an [`AuditStore`] and swallows its failures.
#[derive(Debug, Clone)]
pub struct AuditSink<E> {
    store: E,
}

impl<E: AuditStore> AuditSink<E> {
    pub fn new(store: E) -> Self {
        Self { store }
    }

    /// Append `record`. Returns whether the store accepted it.
    pub async fn record(&self, record: AuditRecord) -> bool {
        let action = record.action;
        match self.store.append_audit(record.clone()).await {
            Ok(()) => true,
            Err(err) => {
                let json = serde_json::to_string(&record)
                    .unwrap_or_else(|e| format!("{{\"unserializable\":\"{e}\"}}"));
                tracing::error!(
                    target: AUDIT_FALLBACK_TARGET,
                    action = %action,
                    error = %err,
                    record = %json,
                    "audit store rejected record"
                );
                false
            }
        }
    }

    pub fn inner(&self) -> &E {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use vigil_core::effects::StoreError;
    use vigil_core::{AuditAction, AuditOutcome, AuditResource, Timestamp, SERVICE_ACTOR};

    #[derive(Default)]
    struct Recorder {
        fail: bool,
        rows: Mutex<Vec<AuditRecord>>,
    }

    #[async_trait]
    impl AuditStore for Recorder {
        async fn append_audit(&self, record: AuditRecord) -> Result<(), StoreError> {
            if self.fail {
                return Err(StoreError::unavailable("audit table offline"));
            }
            self.rows.lock().push(record);
            Ok(())
        }
    }

    fn record() -> AuditRecord {
        AuditRecord::new(
            SERVICE_ACTOR,
            AuditAction::OverdueRelease,
            AuditResource::Endpoint {
                name: "process".into(),
            },
            AuditOutcome::Success,
            Timestamp::from_millis(1),
        )
    }

    #[tokio::test]
    async fn test_record_appends() {
        let sink = AuditSink::new(Recorder::default());
        assert!(sink.record(record()).await);
        assert_eq!(sink.inner().rows.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let sink = AuditSink::new(Recorder {
            fail: true,
            ..Default::default()
        });
        assert!(!sink.record(record()).await);
        assert!(sink.inner().rows.lock().is_empty());
    }
}
