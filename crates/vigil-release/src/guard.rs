//! Authorization guard for forced (emergency) releases.
//!
//! Only callers presenting the configured service credential may bypass the
//! overdue check. The guard itself has no side effects; the engine audits
//! denials.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a forced release was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Denial {
    /// No credential, or an empty one
    Missing,
    /// Credential does not match
    Mismatch,
    /// No service credential is configured, so nothing can match
    NotConfigured,
}

impl Denial {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Mismatch => "mismatch",
            Self::NotConfigured => "not_configured",
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Holds the service credential and checks callers against it.
#[derive(Clone, Default)]
pub struct AuthorizationGuard {
    credential: Option<String>,
}

impl AuthorizationGuard {
    /// Empty or absent credentials leave the guard unconfigured.
    pub fn new(credential: Option<String>) -> Self {
        Self {
            credential: credential.filter(|c| !c.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credential.is_some()
    }

    /// Exact, constant-time match against the service credential.
    pub fn authorize_forced_release(&self, provided: Option<&str>) -> Result<(), Denial> {
        let Some(expected) = self.credential.as_deref() else {
            return Err(Denial::NotConfigured);
        };
        let provided = match provided {
            Some(p) if !p.is_empty() => p,
            _ => return Err(Denial::Missing),
        };
        if constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
            Ok(())
        } else {
            Err(Denial::Mismatch)
        }
    }
}

impl fmt::Debug for AuthorizationGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationGuard")
            .field("configured", &self.is_configured())
            .finish()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_is_authorized() {
        let guard = AuthorizationGuard::new(Some("s3cret".into()));
        assert_eq!(guard.authorize_forced_release(Some("s3cret")), Ok(()));
    }

    #[test]
    fn test_denials() {
        let guard = AuthorizationGuard::new(Some("s3cret".into()));
        assert_eq!(guard.authorize_forced_release(None), Err(Denial::Missing));
        assert_eq!(guard.authorize_forced_release(Some("")), Err(Denial::Missing));
        assert_eq!(
            guard.authorize_forced_release(Some("s3cre")),
            Err(Denial::Mismatch)
        );
        assert_eq!(
            guard.authorize_forced_release(Some("S3CRET")),
            Err(Denial::Mismatch)
        );
        assert_eq!(
            guard.authorize_forced_release(Some("s3cret ")),
            Err(Denial::Mismatch)
        );
    }

    #[test]
    fn test_unconfigured_guard_denies_everything() {
        for guard in [
            AuthorizationGuard::new(None),
            AuthorizationGuard::new(Some(String::new())),
        ] {
            assert!(!guard.is_configured());
            assert_eq!(
                guard.authorize_forced_release(Some("anything")),
                Err(Denial::NotConfigured)
            );
            assert_eq!(
                guard.authorize_forced_release(Some("")),
                Err(Denial::NotConfigured)
            );
        }
    }

    #[test]
    fn test_debug_does_not_leak_credential() {
        let guard = AuthorizationGuard::new(Some("s3cret".into()));
        assert!(!format!("{guard:?}").contains("s3cret"));
    }
}
