use std::fmt;

/// Exhaustive error taxonomy for the routing pipeline. Every internal
/// failure maps to exactly one of these kinds; nothing falls through to a
/// generic string variant.
#[derive(Debug)]
pub enum RouterError {
    /// Prompt malformed or caller pinned an unknown model id. Not retryable.
    InvalidRequest(String),

    /// Selector + relaxation pass found no model. Not retryable.
    NoCandidates,

    /// Credentials missing at pool creation. Sticky for the provider;
    /// skip to the next chain entry.
    ProviderUnavailable { provider: String },

    /// 401/403 from a provider. Try the next provider.
    AuthFailed { provider: String, message: String },

    /// 429 from a provider. Try the next provider.
    RateLimited {
        provider: String,
        retry_after: Option<u64>,
    },

    /// Timeout, DNS failure, or 5xx. Retried up to the configured budget
    /// before the orchestrator falls back to the next model.
    TransientNetwork { provider: String, message: String },

    /// Model's context window can't hold the request. Orchestrator tries
    /// chain members with larger context windows first.
    ContextExceeded {
        provider: String,
        context_window: u32,
    },

    /// 4xx not classified above. Try the next provider.
    ProviderError {
        provider: String,
        code: Option<String>,
        message: String,
    },

    /// A caller-registered tool handler raised. Surfaced directly, not
    /// retried.
    ToolHandlerFailed { tool: String, message: String },

    /// Deadline exceeded or the caller's cancellation token fired.
    Cancelled,

    /// The fallback chain was walked to exhaustion without success.
    /// Carries the ordered list of (model_id, error) attempts.
    ProvidersExhausted {
        attempts: Vec<(String, RouterError)>,
    },
}

impl RouterError {
    /// Whether the orchestrator should walk the fallback chain on this
    /// error, vs. surfacing it to the caller immediately.
    pub fn is_retryable_with_different_model(&self) -> bool {
        matches!(
            self,
            RouterError::RateLimited { .. }
                | RouterError::AuthFailed { .. }
                | RouterError::ProviderError { .. }
                | RouterError::TransientNetwork { .. }
                | RouterError::ContextExceeded { .. }
                | RouterError::ProviderUnavailable { .. }
        )
    }

    /// A short machine-readable tag, used for CLI exit codes and the
    /// `providers_exhausted` attempt list.
    pub fn kind(&self) -> &'static str {
        match self {
            RouterError::InvalidRequest(_) => "invalid_request",
            RouterError::NoCandidates => "no_candidates",
            RouterError::ProviderUnavailable { .. } => "provider_unavailable",
            RouterError::AuthFailed { .. } => "auth_failed",
            RouterError::RateLimited { .. } => "rate_limited",
            RouterError::TransientNetwork { .. } => "transient_network",
            RouterError::ContextExceeded { .. } => "context_exceeded",
            RouterError::ProviderError { .. } => "provider_error",
            RouterError::ToolHandlerFailed { .. } => "tool_handler_failed",
            RouterError::Cancelled => "cancelled",
            RouterError::ProvidersExhausted { .. } => "providers_exhausted",
        }
    }
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterError::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            RouterError::NoCandidates => {
                write!(f, "no model satisfies the task requirements")
            }
            RouterError::ProviderUnavailable { provider } => {
                write!(f, "provider '{provider}' is unavailable (missing credentials)")
            }
            RouterError::AuthFailed { provider, message } => {
                write!(f, "authentication failed for provider '{provider}': {message}")
            }
            RouterError::RateLimited {
                provider,
                retry_after,
            } => match retry_after {
                Some(seconds) => write!(
                    f,
                    "provider '{provider}' rate limited, retry after {seconds}s"
                ),
                None => write!(f, "provider '{provider}' rate limited"),
            },
            RouterError::TransientNetwork { provider, message } => {
                write!(f, "transient network error calling '{provider}': {message}")
            }
            RouterError::ContextExceeded {
                provider,
                context_window,
            } => write!(
                f,
                "request exceeds context window of '{provider}' ({context_window} tokens)"
            ),
            RouterError::ProviderError {
                provider,
                code,
                message,
            } => match code {
                Some(c) => write!(f, "provider '{provider}' error {c}: {message}"),
                None => write!(f, "provider '{provider}' error: {message}"),
            },
            RouterError::ToolHandlerFailed { tool, message } => {
                write!(f, "tool handler '{tool}' failed: {message}")
            }
            RouterError::Cancelled => write!(f, "request cancelled"),
            RouterError::ProvidersExhausted { attempts } => {
                write!(f, "all providers exhausted: ")?;
                for (i, (model_id, err)) in attempts.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{model_id} -> {}", err.kind())?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for RouterError {}

pub type RouterResult<T> = Result<T, RouterError>;

/// Classifies a `reqwest` transport failure into the taxonomy above.
/// Status-code classification (401/403/429 vs. generic 4xx/5xx) happens
/// at the provider client, which has the provider id in scope; this
/// conversion only handles the transport-level cases reqwest itself can
/// distinguish.
impl RouterError {
    pub fn from_reqwest(provider: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RouterError::TransientNetwork {
                provider: provider.to_string(),
                message: "request timed out".to_string(),
            }
        } else if err.is_connect() {
            RouterError::TransientNetwork {
                provider: provider.to_string(),
                message: "connection failed".to_string(),
            }
        } else if let Some(status) = err.status() {
            match status.as_u16() {
                401 | 403 => RouterError::AuthFailed {
                    provider: provider.to_string(),
                    message: err.to_string(),
                },
                429 => RouterError::RateLimited {
                    provider: provider.to_string(),
                    retry_after: None,
                },
                500..=599 => RouterError::TransientNetwork {
                    provider: provider.to_string(),
                    message: err.to_string(),
                },
                code => RouterError::ProviderError {
                    provider: provider.to_string(),
                    code: Some(code.to_string()),
                    message: err.to_string(),
                },
            }
        } else {
            RouterError::TransientNetwork {
                provider: provider.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Conversion from `serde_yaml::Error` for the registry loader boundary.
impl From<serde_yaml::Error> for RouterError {
    fn from(err: serde_yaml::Error) -> Self {
        RouterError::InvalidRequest(format!("registry yaml parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_match_taxonomy_names() {
        assert_eq!(RouterError::NoCandidates.kind(), "no_candidates");
        assert_eq!(RouterError::Cancelled.kind(), "cancelled");
        assert_eq!(
            RouterError::ProviderUnavailable {
                provider: "openai".into()
            }
            .kind(),
            "provider_unavailable"
        );
    }

    #[test]
    fn retryable_classification_matches_taxonomy_table() {
        assert!(RouterError::RateLimited {
            provider: "openai".into(),
            retry_after: None
        }
        .is_retryable_with_different_model());
        assert!(!RouterError::InvalidRequest("bad".into())
            .is_retryable_with_different_model());
        assert!(!RouterError::Cancelled.is_retryable_with_different_model());
        assert!(!RouterError::ToolHandlerFailed {
            tool: "get_time".into(),
            message: "boom".into()
        }
        .is_retryable_with_different_model());
    }

    #[test]
    fn providers_exhausted_display_lists_attempts_in_order() {
        let err = RouterError::ProvidersExhausted {
            attempts: vec![
                (
                    "a".to_string(),
                    RouterError::RateLimited {
                        provider: "openai".into(),
                        retry_after: None,
                    },
                ),
                (
                    "b".to_string(),
                    RouterError::AuthFailed {
                        provider: "anthropic".into(),
                        message: "bad key".into(),
                    },
                ),
            ],
        };
        let s = err.to_string();
        assert!(s.contains("a -> rate_limited"));
        assert!(s.contains("b -> auth_failed"));
    }
}
