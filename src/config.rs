//! Engine configuration and the credential provider boundary.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Tuning and board classification for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Column names counted as active work for the board-level summary and
    /// the per-assignee breakdown. Exact-match against the column name.
    pub active_columns: Vec<String>,
    /// Column names counted as closed work. Columns in neither group only
    /// contribute to their own per-column summary.
    pub closed_columns: Vec<String>,
    /// Pattern for estimate labels. The first capture group is the numeric
    /// value; the whole trimmed label text must match.
    pub estimate_pattern: Regex,
    /// Trailing-edge debounce window for mutation bursts.
    pub quiet_period: Duration,
    /// Delay after a navigation signal before re-discovering the board,
    /// letting the new page's tree materialize.
    pub settle_delay: Duration,
    /// Board discovery retries after navigation before giving up until the
    /// next navigation signal.
    pub discover_attempts: u32,
    pub discover_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            active_columns: vec![
                "📅 Planned".to_string(),
                "🚧 In progress".to_string(),
                "🔬 In QA".to_string(),
            ],
            closed_columns: Vec::new(),
            estimate_pattern: Regex::new(r"(?i)^(\d+(?:\.\d+)?)\s*pt$")
                .expect("default estimate pattern is valid"),
            quiet_period: Duration::from_millis(50),
            settle_delay: Duration::from_millis(500),
            discover_attempts: 10,
            discover_interval: Duration::from_millis(200),
        }
    }
}

/// Credentials for the remote reorder API. Both fields default to empty;
/// either empty means "not configured".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub identity: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.identity.is_empty() && !self.secret.is_empty()
    }
}

/// Asynchronous credential lookup. Persistence is entirely the provider's
/// concern; the engine reads fresh on every reorder activation.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Credentials;
}

/// Fixed in-memory credentials, for embedders that manage storage themselves.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials(pub Credentials);

#[async_trait]
impl CredentialStore for StaticCredentials {
    async fn load(&self) -> Credentials {
        self.0.clone()
    }
}

/// Credentials from environment variables.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    identity_var: String,
    secret_var: String,
}

impl EnvCredentials {
    pub fn new(identity_var: impl Into<String>, secret_var: impl Into<String>) -> Self {
        Self {
            identity_var: identity_var.into(),
            secret_var: secret_var.into(),
        }
    }
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new("BOARDPOINTS_USER", "BOARDPOINTS_TOKEN")
    }
}

#[async_trait]
impl CredentialStore for EnvCredentials {
    async fn load(&self) -> Credentials {
        Credentials {
            identity: std::env::var(&self.identity_var).unwrap_or_default(),
            secret: std::env::var(&self.secret_var).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_identity_or_secret_means_unconfigured() {
        assert!(!Credentials::default().is_configured());
        assert!(!Credentials::new("alice", "").is_configured());
        assert!(!Credentials::new("", "token").is_configured());
        assert!(Credentials::new("alice", "token").is_configured());
    }

    #[test]
    fn default_estimate_pattern_matches_case_insensitively() {
        let config = EngineConfig::default();
        assert!(config.estimate_pattern.is_match("3 pt"));
        assert!(config.estimate_pattern.is_match("0.5 PT"));
        assert!(!config.estimate_pattern.is_match("pt 3"));
        assert!(!config.estimate_pattern.is_match("3 points"));
    }
}
