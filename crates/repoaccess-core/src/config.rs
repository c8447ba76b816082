//! Access layer configuration and environment overrides.

use crate::command::DEFAULT_GIT;
use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Environment variables understood by [`AccessConfig::apply_env`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessEnvVar {
    /// `REPOACCESS_WORKSPACE_DIR` - base directory for workspaces.
    WorkspaceDir,
    /// `REPOACCESS_GITHUB_API_URL` - GitHub API base URL.
    GitHubApiUrl,
    /// `REPOACCESS_GITLAB_API_URL` - GitLab API base URL.
    GitLabApiUrl,
    /// `REPOACCESS_HTTP_TIMEOUT` - HTTP request timeout in seconds.
    HttpTimeout,
    /// `REPOACCESS_MAX_ATTEMPTS` - attempt bound for transient failures.
    MaxAttempts,
    /// `REPOACCESS_GIT` - git executable.
    Git,
    /// `REPOACCESS_CACHE` - enable the workspace cache.
    Cache,
}

impl AccessEnvVar {
    /// All variables.
    pub const ALL: [Self; 7] = [
        Self::WorkspaceDir,
        Self::GitHubApiUrl,
        Self::GitLabApiUrl,
        Self::HttpTimeout,
        Self::MaxAttempts,
        Self::Git,
        Self::Cache,
    ];

    /// Variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WorkspaceDir => "REPOACCESS_WORKSPACE_DIR",
            Self::GitHubApiUrl => "REPOACCESS_GITHUB_API_URL",
            Self::GitLabApiUrl => "REPOACCESS_GITLAB_API_URL",
            Self::HttpTimeout => "REPOACCESS_HTTP_TIMEOUT",
            Self::MaxAttempts => "REPOACCESS_MAX_ATTEMPTS",
            Self::Git => "REPOACCESS_GIT",
            Self::Cache => "REPOACCESS_CACHE",
        }
    }

    /// Value from the process environment.
    #[must_use]
    pub fn get(self) -> Option<String> {
        std::env::var(self.as_str()).ok()
    }
}

/// Configuration of the access layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AccessConfig {
    /// Base directory under which workspaces are allocated.
    pub workspace_dir: PathBuf,
    /// GitHub API base URL override (GitHub Enterprise).
    pub github_api_url: Option<Url>,
    /// GitLab API base URL override.
    pub gitlab_api_url: Option<Url>,
    /// HTTP request timeout in seconds.
    pub http_timeout: u64,
    /// HTTP connect timeout in seconds.
    pub connect_timeout: u64,
    /// Provider requests per second per host.
    pub rate_limit_per_host: u32,
    /// Total attempts for transient failures.
    pub max_attempts: u32,
    /// First retry delay in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Largest retry delay in milliseconds.
    pub retry_max_delay_ms: u64,
    /// Default clone depth; `None` clones full history.
    pub default_depth: Option<u32>,
    /// Workspaces older than this many seconds are swept.
    pub stale_workspace_age: u64,
    /// Sweep stale workspaces when the access layer starts.
    pub sweep_on_startup: bool,
    /// Share populated workspaces between identical checkouts.
    pub cache_enabled: bool,
    /// Maximum cached workspaces.
    pub cache_capacity: u64,
    /// Cached workspaces idle this many seconds are evicted.
    pub cache_idle_secs: u64,
    /// Git executable.
    pub git: PathBuf,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            workspace_dir: std::env::temp_dir().join("repoaccess-workspaces"),
            github_api_url: None,
            gitlab_api_url: None,
            http_timeout: 30,
            connect_timeout: 10,
            rate_limit_per_host: 10,
            max_attempts: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 30_000,
            default_depth: Some(1),
            stale_workspace_age: 24 * 60 * 60,
            sweep_on_startup: true,
            cache_enabled: false,
            cache_capacity: 32,
            cache_idle_secs: 600,
            git: PathBuf::from(DEFAULT_GIT),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl AccessConfig {
    /// Defaults overridden by the process environment.
    ///
    /// # Errors
    /// Returns error if a variable holds an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|var| var.get())?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup.
    ///
    /// # Errors
    /// Returns error if a variable holds an invalid value.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(AccessEnvVar) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let invalid = |var: AccessEnvVar, value: &str| ConfigError::InvalidEnv {
            var: var.as_str(),
            value: value.to_string(),
        };

        for var in AccessEnvVar::ALL {
            let Some(value) = lookup(var) else { continue };
            match var {
                AccessEnvVar::WorkspaceDir => self.workspace_dir = PathBuf::from(&value),
                AccessEnvVar::GitHubApiUrl => {
                    self.github_api_url =
                        Some(Url::parse(&value).map_err(|_| invalid(var, &value))?);
                }
                AccessEnvVar::GitLabApiUrl => {
                    self.gitlab_api_url =
                        Some(Url::parse(&value).map_err(|_| invalid(var, &value))?);
                }
                AccessEnvVar::HttpTimeout => {
                    self.http_timeout = value.trim().parse().map_err(|_| invalid(var, &value))?;
                }
                AccessEnvVar::MaxAttempts => {
                    self.max_attempts = value.trim().parse().map_err(|_| invalid(var, &value))?;
                }
                AccessEnvVar::Git => self.git = PathBuf::from(&value),
                AccessEnvVar::Cache => {
                    self.cache_enabled = parse_bool(&value).ok_or_else(|| invalid(var, &value))?;
                }
            }
        }
        self.validate()
    }

    /// Check value ranges.
    ///
    /// # Errors
    /// Returns error describing the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |message: &str| {
            Err(ConfigError::Invalid {
                message: message.to_string(),
            })
        };
        if self.max_attempts == 0 {
            return fail("max-attempts must be at least 1");
        }
        if self.rate_limit_per_host == 0 {
            return fail("rate-limit-per-host must be at least 1");
        }
        if self.http_timeout == 0 {
            return fail("http-timeout must be at least 1 second");
        }
        if self.default_depth == Some(0) {
            return fail("default-depth must be at least 1 when set");
        }
        if self.workspace_dir.as_os_str().is_empty() {
            return fail("workspace-dir must not be empty");
        }
        Ok(())
    }

    /// Retry policy derived from the configuration.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts).with_delays(
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }

    /// HTTP request timeout.
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }

    /// HTTP connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Stale workspace threshold.
    #[must_use]
    pub const fn stale_workspace_age(&self) -> Duration {
        Duration::from_secs(self.stale_workspace_age)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(
        vars: &[(AccessEnvVar, &str)],
    ) -> impl Fn(AccessEnvVar) -> Option<String> + use<> {
        let map: HashMap<AccessEnvVar, String> =
            vars.iter().map(|(k, v)| (*k, (*v).to_string())).collect();
        move |var| map.get(&var).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AccessConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retry_policy().max_attempts, 3);
        assert_eq!(config.default_depth, Some(1));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AccessConfig::default();
        config
            .apply_env(lookup(&[
                (AccessEnvVar::WorkspaceDir, "/var/tmp/ws"),
                (AccessEnvVar::GitHubApiUrl, "https://ghe.example.com/api/v3/"),
                (AccessEnvVar::MaxAttempts, "5"),
                (AccessEnvVar::Cache, "yes"),
            ]))
            .unwrap();
        assert_eq!(config.workspace_dir, PathBuf::from("/var/tmp/ws"));
        assert_eq!(
            config.github_api_url.as_ref().map(Url::as_str),
            Some("https://ghe.example.com/api/v3/")
        );
        assert_eq!(config.max_attempts, 5);
        assert!(config.cache_enabled);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = AccessConfig::default();
        let err = config
            .apply_env(lookup(&[(AccessEnvVar::HttpTimeout, "soon")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                var: "REPOACCESS_HTTP_TIMEOUT",
                value: "soon".into()
            }
        );
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = AccessConfig::default();
        assert_matches!(
            config.apply_env(lookup(&[(AccessEnvVar::MaxAttempts, "0")])),
            Err(ConfigError::Invalid { .. })
        );
    }

    #[test]
    fn test_deserialize_partial() {
        let config: AccessConfig =
            serde_json::from_str(r#"{"max-attempts": 4, "cache-enabled": true}"#).unwrap();
        assert_eq!(config.max_attempts, 4);
        assert!(config.cache_enabled);
        assert_eq!(config.http_timeout, 30);
    }
}
