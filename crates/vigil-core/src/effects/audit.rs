//! Append-only audit log collaborator.

use async_trait::async_trait;

use super::StoreError;
use crate::types::AuditRecord;

/// Append-only sink for audit rows. Records are never updated or deleted.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append_audit(&self, record: AuditRecord) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: AuditStore + ?Sized> AuditStore for std::sync::Arc<T> {
    async fn append_audit(&self, record: AuditRecord) -> Result<(), StoreError> {
        (**self).append_audit(record).await
    }
}
