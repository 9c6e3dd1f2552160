//! Dispatch handler that writes emails to the process log instead of sending.
//!
//! The default when no provider is configured, so a misconfigured deployment
//! still leaves a trace of every release.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;
use vigil_core::effects::{DispatchError, DispatchReceipt, EmailDispatchEffects, EmailRequest};

use super::validate_address;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogDispatchHandler;

impl LogDispatchHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailDispatchEffects for LogDispatchHandler {
    async fn send_email(&self, request: EmailRequest) -> Result<DispatchReceipt, DispatchError> {
        validate_address(&request.to_email)?;
        let message_id = format!("log-{}", Uuid::new_v4());
        info!(
            message_id = %message_id,
            to = %request.to_email,
            owner = %request.owner_id,
            subject = %request.subject,
            body_len = request.html_body.len(),
            "email dispatch (log only)"
        );
        Ok(DispatchReceipt { message_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use vigil_core::OwnerId;

    fn request(to: &str) -> EmailRequest {
        EmailRequest {
            to_email: to.to_string(),
            to_name: "Ada".into(),
            subject: "subject".into(),
            html_body: "<p>hi</p>".into(),
            owner_id: OwnerId::from_u128(1),
        }
    }

    #[tokio::test]
    async fn test_log_dispatch_returns_receipt() {
        let receipt = LogDispatchHandler::new()
            .send_email(request("ada@example.com"))
            .await
            .unwrap();
        assert!(receipt.message_id.starts_with("log-"));
    }

    #[tokio::test]
    async fn test_log_dispatch_rejects_bad_address() {
        let result = LogDispatchHandler::new().send_email(request("nobody")).await;
        assert_matches!(result, Err(DispatchError::InvalidRecipient { .. }));
    }
}
