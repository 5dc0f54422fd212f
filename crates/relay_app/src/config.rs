//! Runtime configuration: defaults, then an optional RON file, then `RELAY_*`
//! environment variables. CLI flags are applied last by `main`.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use relay_core::{PollSettings, TerminalRule};
use relay_engine::{AuthSettings, DEFAULT_MAX_BODY_BYTES};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "contract-relay.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config file {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub bind: String,
    /// Address the pipeline can reach this relay at, e.g. behind a proxy.
    pub public_url: Option<String>,
    pub max_body_bytes: usize,
    pub poll_interval_ms: u64,
    pub max_backoff_ms: u64,
    pub clear_attempts: u32,
    pub terminal_rule: TerminalRule,
    pub backend_url: String,
    pub auth_server: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub output_dir: PathBuf,
    pub log: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3001".to_string(),
            public_url: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            poll_interval_ms: 2000,
            max_backoff_ms: 30_000,
            clear_attempts: 3,
            terminal_rule: TerminalRule::default(),
            backend_url: "http://127.0.0.1:8000".to_string(),
            auth_server: None,
            client_id: None,
            redirect_uri: None,
            output_dir: PathBuf::from("output"),
            log: "info".to_string(),
        }
    }
}

impl RelayConfig {
    /// Loads `path`, or `contract-relay.ron` in the working directory when it exists.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)?
                } else {
                    Self::default()
                }
            }
        };
        config.with_env(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&content).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    /// Applies `RELAY_*` overrides read through `lookup`.
    pub fn with_env(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup("RELAY_BIND") {
            self.bind = value;
        }
        if let Some(value) = lookup("RELAY_PUBLIC_URL") {
            self.public_url = Some(value);
        }
        if let Some(value) = lookup("RELAY_MAX_BODY_BYTES") {
            self.max_body_bytes = parse_value("RELAY_MAX_BODY_BYTES", &value)?;
        }
        if let Some(value) = lookup("RELAY_POLL_INTERVAL_MS") {
            self.poll_interval_ms = parse_value("RELAY_POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = lookup("RELAY_MAX_BACKOFF_MS") {
            self.max_backoff_ms = parse_value("RELAY_MAX_BACKOFF_MS", &value)?;
        }
        if let Some(value) = lookup("RELAY_CLEAR_ATTEMPTS") {
            self.clear_attempts = parse_value("RELAY_CLEAR_ATTEMPTS", &value)?;
        }
        if let Some(value) = lookup("RELAY_TERMINAL_RULE") {
            self.terminal_rule = parse_value("RELAY_TERMINAL_RULE", &value)?;
        }
        if let Some(value) = lookup("RELAY_BACKEND_URL") {
            self.backend_url = value;
        }
        if let Some(value) = lookup("RELAY_AUTH_SERVER") {
            self.auth_server = Some(value);
        }
        if let Some(value) = lookup("RELAY_CLIENT_ID") {
            self.client_id = Some(value);
        }
        if let Some(value) = lookup("RELAY_REDIRECT_URI") {
            self.redirect_uri = Some(value);
        }
        if let Some(value) = lookup("RELAY_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("RELAY_LOG") {
            self.log = value;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms", "0", "must be positive"));
        }
        if self.clear_attempts == 0 {
            return Err(invalid("clear_attempts", "0", "must be at least 1"));
        }
        if self.max_body_bytes == 0 {
            return Err(invalid("max_body_bytes", "0", "must be positive"));
        }
        if relay_logging::parse_level(&self.log).is_none() {
            return Err(invalid("log", &self.log, "expected off, error, warn, info, debug or trace"));
        }
        Ok(())
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            clear_attempts: self.clear_attempts,
            terminal_rule: self.terminal_rule,
        }
    }

    /// Sign-in settings; all three values are needed to offer `/auth/login`.
    pub fn auth_settings(&self) -> Option<AuthSettings> {
        Some(AuthSettings {
            authorization_server: self.auth_server.clone()?,
            client_id: self.client_id.clone()?,
            redirect_uri: self.redirect_uri.clone()?,
        })
    }

    /// Base URL a local `watch` polls; wildcard binds are reached over loopback.
    pub fn relay_url(&self) -> String {
        if let Some(public_url) = &self.public_url {
            return public_url.clone();
        }
        match wildcard_port(&self.bind) {
            Some(port) => format!("http://127.0.0.1:{port}"),
            None => format!("http://{}", self.bind),
        }
    }

    /// Base URL handed to the backend as the webhook target.
    ///
    /// A wildcard bind says nothing about how the pipeline reaches us, so
    /// `public_url` is required then.
    pub fn webhook_base_url(&self) -> Result<String, ConfigError> {
        if let Some(public_url) = &self.public_url {
            return Ok(public_url.clone());
        }
        if wildcard_port(&self.bind).is_some() {
            return Err(invalid(
                "public_url",
                &self.bind,
                "set public_url (RELAY_PUBLIC_URL) when binding to a wildcard address",
            ));
        }
        Ok(format!("http://{}", self.bind))
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: err.to_string(),
    })
}

/// Port of a `0.0.0.0:port` or `[::]:port` bind.
fn wildcard_port(bind: &str) -> Option<&str> {
    let (host, port) = bind.rsplit_once(':')?;
    matches!(host, "0.0.0.0" | "[::]" | "::").then_some(port)
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = RelayConfig::default();
        let settings = config.poll_settings();
        assert_eq!(settings.interval, Duration::from_millis(2000));
        assert_eq!(settings.clear_attempts, 3);
        assert_eq!(settings.terminal_rule, TerminalRule::Either);
        assert!(config.auth_settings().is_none());
        assert_eq!(config.relay_url(), "http://127.0.0.1:3001");
    }

    #[test]
    fn partial_ron_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.ron");
        fs::write(
            &path,
            "(bind: \"0.0.0.0:8080\", terminal_rule: explicit_terminate, poll_interval_ms: 500)",
        )
        .unwrap();

        let config = RelayConfig::from_file(&path).unwrap();
        assert_eq!(config.bind, "0.0.0.0:8080");
        assert_eq!(config.terminal_rule, TerminalRule::ExplicitTerminate);
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.clear_attempts, 3);
    }

    #[test]
    fn wildcard_bind_needs_a_public_url_for_registration() {
        let mut config = RelayConfig {
            bind: "0.0.0.0:3001".to_string(),
            ..RelayConfig::default()
        };
        assert_eq!(config.relay_url(), "http://127.0.0.1:3001");
        assert!(matches!(
            config.webhook_base_url(),
            Err(ConfigError::Invalid { key: "public_url", .. })
        ));

        config.public_url = Some("https://relay.example.com".to_string());
        assert_eq!(config.webhook_base_url().unwrap(), "https://relay.example.com");
        assert_eq!(config.relay_url(), "https://relay.example.com");

        let local = RelayConfig::default();
        assert_eq!(local.webhook_base_url().unwrap(), "http://127.0.0.1:3001");
    }

    #[test]
    fn unreadable_and_malformed_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.ron");
        assert!(matches!(
            RelayConfig::from_file(&missing),
            Err(ConfigError::Read { .. })
        ));

        let broken = dir.path().join("broken.ron");
        fs::write(&broken, "(bind: ").unwrap();
        assert!(matches!(
            RelayConfig::from_file(&broken),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn environment_overrides_file_values() {
        let config = RelayConfig::default()
            .with_env(env(&[
                ("RELAY_POLL_INTERVAL_MS", "250"),
                ("RELAY_TERMINAL_RULE", "batch_completed"),
                ("RELAY_AUTH_SERVER", "https://account-d.example.com"),
                ("RELAY_CLIENT_ID", "client"),
                ("RELAY_REDIRECT_URI", "http://localhost/auth/callback"),
                ("RELAY_LOG", "debug"),
            ]))
            .unwrap();

        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.terminal_rule, TerminalRule::BatchCompletedAtGraph);
        assert_eq!(
            config.auth_settings().map(|auth| auth.client_id),
            Some("client".to_string())
        );
        assert_eq!(config.log, "debug");
    }

    #[test]
    fn invalid_environment_values_are_rejected() {
        let err = RelayConfig::default()
            .with_env(env(&[("RELAY_CLEAR_ATTEMPTS", "many")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "RELAY_CLEAR_ATTEMPTS",
                ..
            }
        ));

        let err = RelayConfig::default()
            .with_env(env(&[("RELAY_POLL_INTERVAL_MS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "poll_interval_ms", .. }));

        let err = RelayConfig::default()
            .with_env(env(&[("RELAY_TERMINAL_RULE", "whenever")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
