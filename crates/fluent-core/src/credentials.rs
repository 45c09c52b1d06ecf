// crates/fluent-core/src/credentials.rs

//! Credential resolution for the Client Pool's first-use path.
//!
//! The pool never reads the environment directly; it asks a
//! `CredentialProvider` for a provider's credentials and records the
//! provider as unavailable if none are found. This keeps the pool
//! testable against a fake provider without touching real env vars.

use std::collections::HashMap;
use std::env;

/// Supplies credentials for a provider id, or reports it as unconfigured.
pub trait CredentialProvider: Send + Sync {
    fn get_credentials(&self, provider_id: &str) -> Option<HashMap<String, String>>;
}

/// Reads `{PROVIDER}_API_KEY`-style environment variables, uppercasing
/// the provider id the way the teacher's `EnvVarResolver` normalizes its
/// `ENV_` prefix lookups.
///
/// # Examples
///
/// ```rust
/// use fluent_core::credentials::{CredentialProvider, EnvCredentialProvider};
///
/// std::env::set_var("OPENAI_API_KEY", "sk-test");
/// let provider = EnvCredentialProvider::new();
/// let creds = provider.get_credentials("openai").unwrap();
/// assert_eq!(creds["api_key"], "sk-test");
/// std::env::remove_var("OPENAI_API_KEY");
/// ```
pub struct EnvCredentialProvider;

impl EnvCredentialProvider {
    pub fn new() -> Self {
        Self
    }

    fn env_var_name(provider_id: &str) -> String {
        format!("{}_API_KEY", provider_id.to_uppercase())
    }
}

impl Default for EnvCredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialProvider for EnvCredentialProvider {
    fn get_credentials(&self, provider_id: &str) -> Option<HashMap<String, String>> {
        let key = env::var(Self::env_var_name(provider_id)).ok()?;
        let mut creds = HashMap::new();
        creds.insert("api_key".to_string(), key);
        Some(creds)
    }
}

/// In-memory provider for tests and for callers that resolve credentials
/// from a source other than the environment (a secret manager, a config
/// file already loaded elsewhere) without pulling that dependency into
/// this crate.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialProvider {
    credentials: HashMap<String, HashMap<String, String>>,
}

impl StaticCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(
        mut self,
        provider_id: impl Into<String>,
        credentials: HashMap<String, String>,
    ) -> Self {
        self.credentials.insert(provider_id.into(), credentials);
        self
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn get_credentials(&self, provider_id: &str) -> Option<HashMap<String, String>> {
        self.credentials.get(provider_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_provider_uppercases_provider_id() {
        env::set_var("ANTHROPIC_API_KEY", "sk-ant-test");
        let provider = EnvCredentialProvider::new();
        let creds = provider.get_credentials("anthropic").unwrap();
        assert_eq!(creds["api_key"], "sk-ant-test");
        env::remove_var("ANTHROPIC_API_KEY");
    }

    #[test]
    fn env_provider_returns_none_when_unset() {
        env::remove_var("NONEXISTENT_PROVIDER_API_KEY");
        let provider = EnvCredentialProvider::new();
        assert!(provider.get_credentials("nonexistent_provider").is_none());
    }

    #[test]
    fn static_provider_serves_preloaded_credentials() {
        let mut creds = HashMap::new();
        creds.insert("api_key".to_string(), "test-key".to_string());
        let provider = StaticCredentialProvider::new().with_provider("local", creds);
        assert_eq!(
            provider.get_credentials("local").unwrap()["api_key"],
            "test-key"
        );
        assert!(provider.get_credentials("unknown").is_none());
    }
}
