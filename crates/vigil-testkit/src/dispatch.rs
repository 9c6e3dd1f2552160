//! Recording email dispatcher with scripted failures.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use vigil_core::effects::{DispatchError, DispatchReceipt, EmailDispatchEffects, EmailRequest};

/// Records every accepted email; rejects addresses marked with `fail_for`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDispatch {
    sent: Arc<Mutex<Vec<EmailRequest>>>,
    attempts: Arc<Mutex<usize>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl ScriptedDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send to `email` fails with `Unreachable`.
    pub fn fail_for(&self, email: impl Into<String>) {
        self.failing.lock().insert(email.into());
    }

    /// Emails that were accepted, in send order.
    pub fn sent(&self) -> Vec<EmailRequest> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, email: &str) -> usize {
        self.sent.lock().iter().filter(|e| e.to_email == email).count()
    }

    /// Accepted and rejected sends.
    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

#[async_trait]
impl EmailDispatchEffects for ScriptedDispatch {
    async fn send_email(&self, request: EmailRequest) -> Result<DispatchReceipt, DispatchError> {
        *self.attempts.lock() += 1;
        if self.failing.lock().contains(&request.to_email) {
            return Err(DispatchError::Unreachable {
                reason: format!("scripted failure for {}", request.to_email),
            });
        }
        let mut sent = self.sent.lock();
        sent.push(request);
        Ok(DispatchReceipt {
            message_id: format!("scripted-{}", sent.len()),
        })
    }
}
