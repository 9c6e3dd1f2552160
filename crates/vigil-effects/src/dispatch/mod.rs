//! Email dispatch handlers.

pub mod http;
pub mod log;

pub use http::{HttpDispatchConfig, HttpDispatchHandler};
pub use log::LogDispatchHandler;

use vigil_core::effects::DispatchError;

/// Cheap structural check before handing an address to a provider.
pub(crate) fn validate_address(address: &str) -> Result<(), DispatchError> {
    let invalid = || DispatchError::InvalidRecipient {
        address: address.to_string(),
    };
    let (local, domain) = address.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.is_empty()
        || !domain.contains('.')
        || address.chars().any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(invalid());
    }
    Ok(())
}
