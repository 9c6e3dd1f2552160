//! Identifier types for configurations, cycles, messages and audit records.
//!
//! All identifiers wrap a UUID. Fresh identifiers are random (v4); stores that
//! already hold UUIDs convert with `From<Uuid>`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::VigilError;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from a UUID
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Deterministic identifier for fixtures and tests
            pub const fn from_u128(value: u128) -> Self {
                Self(Uuid::from_u128(value))
            }

            /// Get the inner UUID
            pub const fn uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = VigilError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s
                    .strip_prefix(concat!($prefix, "-"))
                    .unwrap_or(s);
                Uuid::parse_str(raw).map(Self).map_err(|e| {
                    VigilError::invalid(format!("invalid {} '{s}': {e}", $prefix))
                })
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_identifier!(
    /// Owner (end user) of configurations, messages and recipients
    OwnerId,
    "owner"
);
uuid_identifier!(
    /// Check-in configuration identifier
    ConfigurationId,
    "config"
);
uuid_identifier!(
    /// Check-in cycle identifier
    CycleId,
    "cycle"
);
uuid_identifier!(
    /// Protected message identifier
    MessageId,
    "message"
);
uuid_identifier!(
    /// Recipient identifier
    RecipientId,
    "recipient"
);
uuid_identifier!(
    /// Audit record identifier
    AuditRecordId,
    "audit"
);
