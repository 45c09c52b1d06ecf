use anyhow::{anyhow, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::process::Command;
use std::sync::Arc;

/// Retry/timeout knobs for the orchestrator, with defaults matching the
/// routing contract (2 retries on transient_network before falling back,
/// 60s per-provider timeout, 8 tool-call loop iterations).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub transient_retry_budget: u32,
    pub provider_call_timeout_secs: u64,
    pub tool_loop_max_iterations: u32,
    pub consensus_default_deadline_secs: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            transient_retry_budget: 2,
            provider_call_timeout_secs: 60,
            tool_loop_max_iterations: 8,
            consensus_default_deadline_secs: 30,
        }
    }
}

/// Per-task-type model preference lists plus a block list, consulted by
/// the Selector ahead of its score-based sort.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelGuideOverrides {
    pub preferred_by_task: HashMap<String, Vec<String>>,
    pub blocked_model_ids: Vec<String>,
}

/// Per-priority scoring weight vector, overriding the built-in formulas
/// in `fluent_engines::scorer`. All four fields are consulted only for
/// the priority they're named after; see the scorer module for the exact
/// formula each weight feeds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScorerWeights {
    pub quality_reasoning: f64,
    pub quality_coding: f64,
    pub speed_speed: f64,
    pub speed_quality_mean: f64,
    pub balanced_quality_mean: f64,
    pub balanced_cost: f64,
    pub balanced_speed: f64,
}

impl Default for ScorerWeights {
    fn default() -> Self {
        Self {
            quality_reasoning: 0.7,
            quality_coding: 0.3,
            speed_speed: 0.8,
            speed_quality_mean: 0.2,
            balanced_quality_mean: 0.4,
            balanced_cost: 0.3,
            balanced_speed: 0.3,
        }
    }
}

/// A variable-resolution rule: tests whether it owns a given raw string,
/// and if so, resolves it to its real value. Composed in order by
/// [`VariableResolverProcessor`] so different prefixes can be backed by
/// different secret stores without the caller caring which.
pub trait VariableResolver: Send + Sync {
    fn is_resolvable(&self, key: &str) -> bool;
    fn resolve(&self, key: &str) -> Result<String>;
}

/// Resolves `ENV_FOO` or `${FOO}` to the `FOO` environment variable.
pub struct EnvVarResolver;

/// Resolves `AMBER_FOO` by shelling out to the `amber` secret manager CLI.
pub struct AmberVarResolver;

/// Resolves `CREDENTIAL_FOO` against an in-memory credential map supplied
/// by the caller (see `crate::credentials`).
pub struct CredentialResolver {
    credentials: HashMap<String, String>,
}

impl CredentialResolver {
    pub fn new(credentials: HashMap<String, String>) -> Self {
        CredentialResolver { credentials }
    }
}

impl VariableResolver for EnvVarResolver {
    fn is_resolvable(&self, key: &str) -> bool {
        key.starts_with("ENV_") || (key.starts_with("${") && key.ends_with('}'))
    }

    fn resolve(&self, key: &str) -> Result<String> {
        let env_key = if let Some(stripped) = key.strip_prefix("ENV_") {
            stripped
        } else if key.starts_with("${") && key.ends_with('}') {
            &key[2..key.len() - 1]
        } else {
            return Err(anyhow!("invalid environment variable format: {}", key));
        };

        env::var(env_key)
            .map_err(|e| anyhow!("failed to find environment variable '{}': {}", env_key, e))
    }
}

impl VariableResolver for AmberVarResolver {
    fn is_resolvable(&self, key: &str) -> bool {
        key.starts_with("AMBER_")
    }

    fn resolve(&self, key: &str) -> Result<String> {
        if !key.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(anyhow!("invalid key format: {}", key));
        }

        let amber_path =
            which::which("amber").map_err(|_| anyhow!("amber command not found in PATH"))?;

        let output = Command::new(amber_path)
            .arg("print")
            .env_clear()
            .output()
            .map_err(|e| anyhow!("failed to execute amber command: {}", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("amber command failed: {}", stderr));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| anyhow!("invalid utf-8 in amber output: {}", e))?;

        for line in stdout.lines() {
            if line.contains(key) {
                let parts: Vec<&str> = line.splitn(2, '=').collect();
                if parts.len() == 2 {
                    return Ok(parts[1].trim().trim_matches('"').to_string());
                }
            }
        }
        Err(anyhow!("amber key not found: {}", key))
    }
}

impl VariableResolver for CredentialResolver {
    fn is_resolvable(&self, key: &str) -> bool {
        key.starts_with("CREDENTIAL_")
    }

    fn resolve(&self, key: &str) -> Result<String> {
        let credential_key = &key[11..];
        debug!("looking up credential: {credential_key}");
        self.credentials
            .get(credential_key)
            .cloned()
            .ok_or_else(|| anyhow!("failed to find credential '{}'", credential_key))
    }
}

/// Walks a chain of resolvers over a raw string, returning the first
/// match. Order matters: env and amber are checked before credentials so
/// a deployment can shadow a stored credential with an env var.
pub struct VariableResolverProcessor {
    resolvers: Vec<Arc<dyn VariableResolver>>,
}

impl Default for VariableResolverProcessor {
    fn default() -> Self {
        VariableResolverProcessor {
            resolvers: vec![Arc::new(EnvVarResolver), Arc::new(AmberVarResolver)],
        }
    }
}

impl VariableResolverProcessor {
    pub fn new(credentials: &HashMap<String, String>) -> Self {
        VariableResolverProcessor {
            resolvers: vec![
                Arc::new(EnvVarResolver),
                Arc::new(AmberVarResolver),
                Arc::new(CredentialResolver::new(credentials.clone())),
            ],
        }
    }

    /// Resolves `key` if any resolver claims it, otherwise returns it
    /// unchanged (a plain literal value, not a reference).
    pub fn resolve_or_literal(&self, key: &str) -> Result<String> {
        for resolver in &self.resolvers {
            if resolver.is_resolvable(key) {
                return resolver.resolve(key);
            }
        }
        Ok(key.to_string())
    }
}
