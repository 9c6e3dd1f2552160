//! HTTP email provider handler
//!
//! Posts one JSON document per email to a transactional email API and reads
//! the provider's message id back. No retries: failures surface to the
//! orchestrator, which logs and audits them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use vigil_core::effects::{DispatchError, DispatchReceipt, EmailDispatchEffects, EmailRequest};

use super::validate_address;

/// Connection settings for the email provider.
#[derive(Clone)]
pub struct HttpDispatchConfig {
    /// Full URL of the provider's send endpoint
    pub endpoint: String,
    /// Bearer API key
    pub api_key: String,
    /// `From` header, e.g. `Vigil <noreply@example.com>`
    pub from_address: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for HttpDispatchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDispatchConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("from_address", &self.from_address)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct ProviderEmail<'a> {
    from: &'a str,
    to: Vec<String>,
    subject: &'a str,
    html: &'a str,
    tags: Vec<ProviderTag>,
}

#[derive(Debug, Serialize)]
struct ProviderTag {
    name: &'static str,
    value: String,
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    id: String,
}

/// Email dispatch over a JSON HTTP API
#[derive(Debug, Clone)]
pub struct HttpDispatchHandler {
    config: HttpDispatchConfig,
    client: reqwest::Client,
}

impl HttpDispatchHandler {
    pub fn new(config: HttpDispatchConfig) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DispatchError::Unreachable {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { config, client })
    }

    fn payload<'a>(&'a self, request: &'a EmailRequest) -> ProviderEmail<'a> {
        ProviderEmail {
            from: &self.config.from_address,
            to: vec![format_mailbox(&request.to_name, &request.to_email)],
            subject: &request.subject,
            html: &request.html_body,
            tags: vec![ProviderTag {
                name: "owner",
                value: request.owner_id.uuid().to_string(),
            }],
        }
    }
}

/// `Name <address>`, dropping characters that would break the header.
fn format_mailbox(name: &str, email: &str) -> String {
    let clean: String = name
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\r' | '\n'))
        .collect();
    let clean = clean.trim();
    if clean.is_empty() {
        email.to_string()
    } else {
        format!("{clean} <{email}>")
    }
}

#[async_trait]
impl EmailDispatchEffects for HttpDispatchHandler {
    async fn send_email(&self, request: EmailRequest) -> Result<DispatchReceipt, DispatchError> {
        validate_address(&request.to_email)?;

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&self.payload(&request))
            .send()
            .await
            .map_err(|e| DispatchError::Unreachable {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected {
                reason: format!("provider returned {status}: {}", truncate(&detail, 200)),
            });
        }

        let body: ProviderResponse = response.json().await.map_err(|e| DispatchError::Rejected {
            reason: format!("unreadable provider response: {e}"),
        })?;
        debug!(message_id = %body.id, to = %request.to_email, "email accepted by provider");
        Ok(DispatchReceipt {
            message_id: body.id,
        })
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
