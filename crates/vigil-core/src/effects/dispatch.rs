//! Email dispatch collaborator.
//!
//! Treated as a black box: the engine hands over one fully rendered email per
//! recipient and never retries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::OwnerId;

/// A rendered email for a single recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRequest {
    pub to_email: String,
    pub to_name: String,
    pub subject: String,
    pub html_body: String,
    pub owner_id: OwnerId,
}

/// Provider acknowledgement of an accepted email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub message_id: String,
}

/// Dispatch failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum DispatchError {
    /// Provider could not be reached
    #[error("email provider unreachable: {reason}")]
    Unreachable { reason: String },
    /// Provider refused the email
    #[error("email rejected: {reason}")]
    Rejected { reason: String },
    /// Recipient address is unusable
    #[error("invalid recipient address: {address}")]
    InvalidRecipient { address: String },
}

#[async_trait]
pub trait EmailDispatchEffects: Send + Sync {
    async fn send_email(&self, request: EmailRequest) -> Result<DispatchReceipt, DispatchError>;
}

#[async_trait]
impl<T: EmailDispatchEffects + ?Sized> EmailDispatchEffects for std::sync::Arc<T> {
    async fn send_email(&self, request: EmailRequest) -> Result<DispatchReceipt, DispatchError> {
        (**self).send_email(request).await
    }
}
