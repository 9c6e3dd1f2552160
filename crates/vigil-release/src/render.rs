//! Release email rendering.

use vigil_core::effects::EmailRequest;
use vigil_core::{ProtectedMessage, Recipient};

/// Build the email a single recipient receives when `message` is released.
pub fn render_release_email(message: &ProtectedMessage, recipient: &Recipient) -> EmailRequest {
    let html_body = format!(
        concat!(
            "<div style=\"font-family: sans-serif; line-height: 1.5\">",
            "<p>Dear {name},</p>",
            "<div>{body}</div>",
            "<hr>",
            "<p style=\"color: #666; font-size: 12px\">",
            "This message was released to you because the sender did not check in ",
            "within their configured grace period.",
            "</p>",
            "</div>"
        ),
        name = escape_html(&recipient.display_name),
        body = escape_html(&message.body).replace('\n', "<br>"),
    );

    EmailRequest {
        to_email: recipient.email.clone(),
        to_name: recipient.display_name.clone(),
        subject: message.title.clone(),
        html_body,
        owner_id: message.owner_id,
    }
}

/// Escape the five HTML-significant characters.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}
