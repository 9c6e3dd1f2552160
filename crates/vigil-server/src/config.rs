//! Service configuration.
//!
//! Loaded from a TOML file, then overridden from `VIGIL_*` environment
//! variables, then validated as a whole. Every field has a default, so an
//! empty file (or no file) yields a runnable local setup with log-only
//! dispatch and an empty in-memory store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vigil_release::{OrchestratorConfig, RateLimitConfig};

/// Overrides `server.service_credential`.
pub const ENV_SERVICE_CREDENTIAL: &str = "VIGIL_SERVICE_CREDENTIAL";
/// Overrides `server.bind`.
pub const ENV_BIND: &str = "VIGIL_BIND";
/// Overrides `dispatch.api_key`.
pub const ENV_DISPATCH_API_KEY: &str = "VIGIL_DISPATCH_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// String that never appears in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Origins allowed to call `/process` from a browser
    pub allowed_origins: Vec<String>,
    /// Take the caller key from the first `X-Forwarded-For` entry
    pub trust_forwarded_for: bool,
    /// Credential required for emergency releases
    pub service_credential: Option<Secret>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
            allowed_origins: Vec::new(),
            trust_forwarded_for: false,
            service_credential: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Log emails instead of sending them
    #[default]
    Log,
    /// POST to an HTTP email API
    Http,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub mode: DispatchMode,
    pub endpoint: Option<String>,
    pub api_key: Option<Secret>,
    pub from_address: String,
    pub timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::Log,
            endpoint: None,
            api_key: None,
            from_address: "Vigil <noreply@localhost.localdomain>".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot used to seed the in-memory store
    pub fixture: Option<PathBuf>,
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub release: OrchestratorConfig,
    pub scheduler: SchedulerConfig,
    pub dispatch: DispatchConfig,
    pub store: StoreConfig,
}

impl VigilConfig {
    pub fn from_toml_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw, path)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::info!(path = %path.display(), "config file not found; using defaults");
            Ok(Self::default())
        }
    }

    /// Full startup sequence: file, environment, validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_or_default(path)?;
        config.merge_with_env();
        config.validate()?;
        Ok(config)
    }

    pub fn merge_with_env(&mut self) {
        self.merge_with_vars(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a variable lookup. Empty values are ignored.
    pub fn merge_with_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(credential) = lookup(ENV_SERVICE_CREDENTIAL) {
            self.server.service_credential = Some(Secret::new(credential));
        }
        if let Some(bind) = lookup(ENV_BIND) {
            self.server.bind = bind;
        }
        if let Some(api_key) = lookup(ENV_DISPATCH_API_KEY) {
            self.dispatch.api_key = Some(Secret::new(api_key));
        }
    }

    /// Check every section, reporting all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.server.bind.trim().is_empty() {
            problems.push("server.bind must not be empty".to_string());
        } else if self.server.bind.parse::<SocketAddr>().is_err() {
            problems.push(format!(
                "server.bind is not a socket address: {}",
                self.server.bind
            ));
        }
        for origin in &self.server.allowed_origins {
            if !(origin.starts_with("http://") || origin.starts_with("https://")) {
                problems.push(format!("server.allowed_origins entry is not an origin: {origin}"));
            }
        }
        if self
            .server
            .service_credential
            .as_ref()
            .is_some_and(Secret::is_empty)
        {
            problems.push("server.service_credential must not be empty when set".to_string());
        }

        if self.rate_limit.max_requests == 0 {
            problems.push("rate_limit.max_requests must be positive".to_string());
        }
        if self.rate_limit.window_secs == 0 {
            problems.push("rate_limit.window_secs must be positive".to_string());
        }
        if self.rate_limit.max_tracked_keys == 0 {
            problems.push("rate_limit.max_tracked_keys must be positive".to_string());
        }

        if self.release.concurrency == 0 {
            problems.push("release.concurrency must be positive".to_string());
        }

        if self.scheduler.enabled && self.scheduler.interval_secs == 0 {
            problems.push("scheduler.interval_secs must be positive".to_string());
        }

        if self.dispatch.mode == DispatchMode::Http {
            if self.dispatch.endpoint.as_deref().map_or(true, str::is_empty) {
                problems.push("dispatch.endpoint is required for http dispatch".to_string());
            }
            if self.dispatch.api_key.as_ref().map_or(true, Secret::is_empty) {
                problems.push(format!(
                    "dispatch.api_key (or {ENV_DISPATCH_API_KEY}) is required for http dispatch"
                ));
            }
        }
        if self.dispatch.timeout_secs == 0 {
            problems.push("dispatch.timeout_secs must be positive".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .bind
            .parse()
            .map_err(|_| ConfigError::Invalid(vec![format!("server.bind: {}", self.server.bind)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = VigilConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rate_limit.max_requests, 20);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.scheduler.interval_secs, 30);
        assert_eq!(config.release.concurrency, 4);
        assert_eq!(config.dispatch.mode, DispatchMode::Log);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let raw = r#"
            [server]
            bind = "0.0.0.0:9000"
            allowed_origins = ["https://app.example.com"]

            [rate_limit]
            max_requests = 5

            [scheduler]
            enabled = false
        "#;
        let config = VigilConfig::from_toml_str(raw, Path::new("vigil.toml")).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert!(!config.scheduler.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[dispatch]\nmode = \"http\"\nendpoint = \"https://mail.example.com/send\"\napi_key = \"k\""
        )
        .unwrap();
        let config = VigilConfig::load(file.path()).unwrap();
        assert_eq!(config.dispatch.mode, DispatchMode::Http);
        assert_eq!(config.dispatch.api_key.unwrap().expose(), "k");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = VigilConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, VigilConfig::default());
        assert_matches!(
            VigilConfig::load_from_file(&dir.path().join("absent.toml")),
            Err(ConfigError::Read { .. })
        );
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = VigilConfig::from_toml_str("[server\nbind = 1", Path::new("bad.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_wrong_value_type_is_parse_error() {
        let raw = "[rate_limit]\nwindow_secs = \"soon\"\n";
        assert_matches!(
            VigilConfig::from_toml_str(raw, Path::new("vigil.toml")),
            Err(ConfigError::Parse { .. })
        );
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_SERVICE_CREDENTIAL, "from-env"),
            (ENV_BIND, "127.0.0.1:9999"),
            (ENV_DISPATCH_API_KEY, "  "),
        ]
        .into_iter()
        .collect();
        let mut config = VigilConfig::default();
        config.merge_with_vars(|key| vars.get(key).map(|v| (*v).to_string()));

        assert_eq!(
            config.server.service_credential.as_ref().map(Secret::expose),
            Some("from-env")
        );
        assert_eq!(config.server.bind, "127.0.0.1:9999");
        assert!(config.dispatch.api_key.is_none());
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let mut config = VigilConfig::default();
        config.server.bind = String::new();
        config.rate_limit.max_requests = 0;
        config.rate_limit.window_secs = 0;
        config.release.concurrency = 0;
        config.dispatch.mode = DispatchMode::Http;

        let Err(ConfigError::Invalid(problems)) = config.validate() else {
            panic!("expected validation failure");
        };
        assert_eq!(problems.len(), 6);
        assert!(problems.iter().any(|p| p.contains("server.bind")));
        assert!(problems.iter().any(|p| p.contains("max_requests")));
        assert!(problems.iter().any(|p| p.contains("window_secs")));
        assert!(problems.iter().any(|p| p.contains("concurrency")));
        assert!(problems.iter().any(|p| p.contains("dispatch.endpoint")));
        assert!(problems.iter().any(|p| p.contains("dispatch.api_key")));
    }

    #[test]
    fn test_bad_origin_is_rejected() {
        let mut config = VigilConfig::default();
        config.server.allowed_origins = vec!["app.example.com".to_string()];
        assert_matches!(config.validate(), Err(ConfigError::Invalid(p)) if p.len() == 1);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = VigilConfig::default();
        config.server.service_credential = Some(Secret::new("hunter2"));
        config.dispatch.api_key = Some(Secret::new("sk_live"));
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("sk_live"));
    }
}
