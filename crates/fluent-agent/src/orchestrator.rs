// crates/fluent-agent/src/orchestrator.rs

//! Top-level routing: analyze → select → execute → (fallback)*, per the
//! state machine in spec §4.7. Owns the components beneath it (Analyzer,
//! Selector, Client Pool, Executor) and is the one piece callers talk to.

use crate::executor::ConversationExecutor;
use fluent_core::config::RouterConfig;
use fluent_core::cost_ledger::CostLedger;
use fluent_core::error::{RouterError, RouterResult};
use fluent_core::registry::ModelRegistry;
use fluent_core::types::{Message, ModelCapability, Priority, RequestOptions, TaskRequirements, TaskType};
use fluent_engines::analyzer::TaskAnalyzer;
use fluent_engines::client_pool::ClientPool;
use fluent_engines::selector::Selector;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Caller-supplied parameters for a single routed request.
#[derive(Clone)]
pub struct RouteRequest {
    pub prompt: String,
    pub model_id: Option<String>,
    pub task_type: Option<TaskType>,
    pub priority: Priority,
    pub messages: Option<Vec<Message>>,
    pub request_options: RequestOptions,
    pub deadline: Option<Duration>,
}

impl Default for RouteRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            model_id: None,
            task_type: None,
            priority: Priority::Balanced,
            messages: None,
            request_options: RequestOptions::default(),
            deadline: None,
        }
    }
}

pub struct Orchestrator {
    registry: Arc<ModelRegistry>,
    analyzer: Arc<TaskAnalyzer>,
    selector: Arc<Selector>,
    client_pool: Arc<ClientPool>,
    executor: Arc<ConversationExecutor>,
    cost_ledger: Arc<CostLedger>,
    config: RouterConfig,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ModelRegistry>,
        analyzer: Arc<TaskAnalyzer>,
        selector: Arc<Selector>,
        client_pool: Arc<ClientPool>,
        executor: Arc<ConversationExecutor>,
        cost_ledger: Arc<CostLedger>,
        config: RouterConfig,
    ) -> Self {
        Self {
            registry,
            analyzer,
            selector,
            client_pool,
            executor,
            cost_ledger,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    fn conversation_for(&self, request: &RouteRequest) -> Vec<Message> {
        request
            .messages
            .clone()
            .unwrap_or_else(|| vec![Message::user(request.prompt.clone())])
    }

    async fn requirements_for(&self, request: &RouteRequest) -> TaskRequirements {
        if request.model_id.is_some() {
            // Pinned model bypasses task analysis entirely (spec §4.7 step
            // 1); a minimal requirements record is still built so a
            // subsequent fallback walk (if the pinned model fails) has
            // something to score candidates against.
            return TaskRequirements {
                task_type: request.task_type.unwrap_or(TaskType::General),
                min_context: 0,
                max_cost: None,
                min_reasoning: 0,
                min_coding: 0,
                priority: request.priority,
            };
        }
        let mut requirements = self.analyzer.analyze(&request.prompt, request.task_type).await;
        requirements.priority = request.priority;
        requirements
    }

    /// Runs a single model attempt: fetch its capability and client, then
    /// execute with the configured transient-network retry budget. Never
    /// walks a fallback chain — used both as the inner step of
    /// `route_request` and directly by the Consensus Engine, whose voters
    /// must not fall back within a single vote.
    pub async fn attempt(
        &self,
        model_id: &str,
        messages: Vec<Message>,
        options: &RequestOptions,
        cancellation: &CancellationToken,
        deadline: Option<Duration>,
        request_id: &str,
    ) -> RouterResult<fluent_core::types::ApiResponse> {
        let capability = self
            .registry
            .get(model_id)
            .ok_or_else(|| RouterError::InvalidRequest(format!("unknown model id '{model_id}'")))?
            .clone();

        if cancellation.is_cancelled() {
            self.record_cancelled(&capability, request_id).await;
            return Err(RouterError::Cancelled);
        }

        let client = match self.client_pool.get(capability.provider).await {
            Ok(client) => client,
            Err(err) => return Err(err),
        };

        let mut last_err: Option<RouterError> = None;
        for retry in 0..=self.config.transient_retry_budget {
            if cancellation.is_cancelled() {
                self.record_cancelled(&capability, request_id).await;
                return Err(RouterError::Cancelled);
            }

            let outcome = self
                .run_with_deadline(&client, &capability, messages.clone(), options, request_id, cancellation, deadline)
                .await;

            match outcome {
                Ok(response) => return Ok(response),
                Err(RouterError::Cancelled) => {
                    self.record_cancelled(&capability, request_id).await;
                    return Err(RouterError::Cancelled);
                }
                Err(RouterError::TransientNetwork { .. }) if retry < self.config.transient_retry_budget => {
                    debug!(
                        "transient network error for model '{model_id}', retry {}/{}",
                        retry + 1,
                        self.config.transient_retry_budget
                    );
                    last_err = outcome.err();
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or(RouterError::InvalidRequest("retry loop exited with no error recorded".to_string())))
    }

    /// Races the executor's call against cancellation and an optional
    /// overall deadline. A deadline firing or the token firing both
    /// collapse to `cancelled` (spec §5: "deadline exhaustion... is
    /// treated as cancelled").
    async fn run_with_deadline(
        &self,
        client: &Arc<dyn fluent_engines::providers::ProviderClient>,
        capability: &ModelCapability,
        messages: Vec<Message>,
        options: &RequestOptions,
        request_id: &str,
        cancellation: &CancellationToken,
        deadline: Option<Duration>,
    ) -> RouterResult<fluent_core::types::ApiResponse> {
        let exec_fut = self.executor.execute(client, capability, messages, options, request_id);
        let cancel_fut = cancellation.cancelled();

        match deadline {
            Some(d) => {
                tokio::select! {
                    res = exec_fut => res,
                    _ = cancel_fut => Err(RouterError::Cancelled),
                    _ = tokio::time::sleep(d) => Err(RouterError::Cancelled),
                }
            }
            None => {
                tokio::select! {
                    res = exec_fut => res,
                    _ = cancel_fut => Err(RouterError::Cancelled),
                }
            }
        }
    }

    async fn record_cancelled(&self, capability: &ModelCapability, request_id: &str) {
        self.cost_ledger
            .record(&capability.id, Default::default(), 0.0, request_id, Some("cancelled".to_string()))
            .await;
    }

    /// Implements the full state machine from spec §4.7: analyze → select
    /// → execute, walking the fallback chain on retryable-with-different-
    /// model errors until success, exhaustion, or a non-retryable error
    /// surfaces directly.
    pub async fn route_request(
        &self,
        request: RouteRequest,
        cancellation: CancellationToken,
    ) -> RouterResult<fluent_core::types::ApiResponse> {
        let request_id = Uuid::new_v4().to_string();
        let mut requirements = self.requirements_for(&request).await;
        let messages = self.conversation_for(&request);

        let mut model_id = match &request.model_id {
            Some(id) => id.clone(),
            None => self.selector.select(&requirements)?,
        };

        let mut already_tried: Vec<String> = Vec::new();
        let mut attempts: Vec<(String, RouterError)> = Vec::new();

        loop {
            // Cancellation is checked inside `attempt` (which also records
            // the zero-token ledger entry for the attempt it aborts), not
            // here, so the first attempt of a pre-cancelled request still
            // produces exactly one cost record per spec S4.
            let capability = match self.registry.get(&model_id) {
                Some(cap) => cap.clone(),
                None => return Err(RouterError::InvalidRequest(format!("unknown model id '{model_id}'"))),
            };

            let result = self
                .attempt(&model_id, messages.clone(), &request.request_options, &cancellation, request.deadline, &request_id)
                .await;

            match result {
                Ok(response) => return Ok(response),
                Err(RouterError::Cancelled) => return Err(RouterError::Cancelled),
                Err(err) if !err.is_retryable_with_different_model() => return Err(err),
                Err(err) => {
                    let demote_provider = if self.selector.top_two_share_provider(&requirements) == Some(capability.provider) {
                        Some(capability.provider)
                    } else {
                        None
                    };

                    if let RouterError::ContextExceeded { context_window, .. } = &err {
                        requirements.min_context = requirements.min_context.max(*context_window + 1);
                    }

                    let chain = self.selector.fallback_chain(&requirements, &model_id, &already_tried, demote_provider);
                    already_tried.push(model_id.clone());
                    attempts.push((model_id.clone(), err));

                    match chain.into_iter().next() {
                        Some(next_id) => {
                            model_id = next_id;
                            continue;
                        }
                        None => {
                            warn!("fallback chain exhausted after {} attempts", attempts.len());
                            return Err(RouterError::ProvidersExhausted { attempts });
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluent_core::credentials::StaticCredentialProvider;
    use fluent_core::types::{ApiResponse, FinishReason, Provider, Usage};
    use fluent_engines::client_pool::MockClientFactory;
    use fluent_engines::providers::mock::{MockProviderClient, Scripted};
    use std::collections::HashMap;

    fn capability(id: &str, provider: Provider, context_window: u32) -> ModelCapability {
        ModelCapability {
            id: id.to_string(),
            provider,
            api_name: id.to_string(),
            context_window,
            input_cost: 1.0,
            output_cost: 1.0,
            reasoning_score: 80,
            coding_score: 80,
            speed_rating: 5,
            supports_vision: false,
            supports_function_calling: true,
            blocked: false,
        }
    }

    fn creds_for(providers: &[&str]) -> Arc<StaticCredentialProvider> {
        let mut provider = StaticCredentialProvider::new();
        for p in providers {
            let mut creds = HashMap::new();
            creds.insert("api_key".to_string(), "k".to_string());
            provider = provider.with_provider(p, creds);
        }
        Arc::new(provider)
    }

    fn build_orchestrator(
        registry: Arc<ModelRegistry>,
        mock: Arc<MockProviderClient>,
        providers: &[&str],
    ) -> (Orchestrator, Arc<CostLedger>) {
        let credential_provider = creds_for(providers);
        let client_pool = Arc::new(ClientPool::with_factory(credential_provider, Arc::new(MockClientFactory(mock))));
        let selector = Arc::new(Selector::new(registry.clone()));
        let analyzer = Arc::new(TaskAnalyzer::new());
        let cost_ledger = Arc::new(CostLedger::new());
        let executor = Arc::new(ConversationExecutor::new(cost_ledger.clone(), 8));
        let orchestrator = Orchestrator::new(registry, analyzer, selector, client_pool, executor, cost_ledger.clone(), RouterConfig::default());
        (orchestrator, cost_ledger)
    }

    fn ok_response(content: &str) -> ApiResponse {
        ApiResponse {
            content: content.to_string(),
            usage: Usage { input_tokens: 42, output_tokens: 100 },
            model_id: "ignored".to_string(),
            finish_reason: FinishReason::Stop,
            tool_calls: None,
        }
    }

    #[tokio::test]
    async fn happy_path_selects_and_executes_top_model() {
        let registry = Arc::new(ModelRegistry::new(vec![
            capability("a", Provider::OpenAI, 128_000),
            capability("b", Provider::Local, 128_000),
        ]));
        let mock = Arc::new(MockProviderClient::new(vec![Scripted::Success(ok_response("explained"))]));
        let (orchestrator, ledger) = build_orchestrator(registry, mock, &["openai", "local"]);

        let request = RouteRequest {
            prompt: "explain recursion".to_string(),
            priority: Priority::Balanced,
            ..Default::default()
        };
        let response = orchestrator.route_request(request, CancellationToken::new()).await.unwrap();
        assert_eq!(response.content, "explained");
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn rate_limit_falls_back_to_next_model() {
        let registry = Arc::new(ModelRegistry::new(vec![
            capability("a", Provider::OpenAI, 128_000),
            capability("b", Provider::Local, 128_000),
        ]));
        let mock = Arc::new(MockProviderClient::new(vec![
            Scripted::Failure(RouterError::RateLimited { provider: "openai".into(), retry_after: None }),
            Scripted::Success(ok_response("recovered")),
        ]));
        let (orchestrator, ledger) = build_orchestrator(registry, mock, &["openai", "local"]);

        let request = RouteRequest {
            prompt: "hello".to_string(),
            ..Default::default()
        };
        let response = orchestrator.route_request(request, CancellationToken::new()).await.unwrap();
        assert_eq!(response.content, "recovered");
        assert_eq!(ledger.len().await, 2);
    }

    #[tokio::test]
    async fn pinned_model_id_bypasses_selection_and_analysis() {
        let registry = Arc::new(ModelRegistry::new(vec![
            capability("a", Provider::OpenAI, 128_000),
            capability("b", Provider::Local, 128_000),
        ]));
        let mock = Arc::new(MockProviderClient::new(vec![Scripted::Success(ok_response("pinned"))]));
        let (orchestrator, _ledger) = build_orchestrator(registry, mock, &["openai", "local"]);

        let request = RouteRequest {
            prompt: "irrelevant for a pinned model".to_string(),
            model_id: Some("b".to_string()),
            ..Default::default()
        };
        let response = orchestrator.route_request(request, CancellationToken::new()).await.unwrap();
        assert_eq!(response.content, "pinned");
    }

    #[tokio::test]
    async fn cancellation_before_call_skips_fallback_and_records_zero_token_entry() {
        let registry = Arc::new(ModelRegistry::new(vec![
            capability("a", Provider::OpenAI, 128_000),
            capability("b", Provider::Local, 128_000),
        ]));
        let mock = Arc::new(MockProviderClient::new(vec![Scripted::Success(ok_response("never seen"))]));
        let (orchestrator, ledger) = build_orchestrator(registry, mock, &["openai", "local"]);

        let token = CancellationToken::new();
        token.cancel();
        let request = RouteRequest {
            prompt: "hello".to_string(),
            ..Default::default()
        };
        let result = orchestrator.route_request(request, token).await;
        assert!(matches!(result, Err(RouterError::Cancelled)));
        let snapshot = ledger.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].note.as_deref(), Some("cancelled"));
        assert_eq!(snapshot[0].input_tokens, 0);
    }

    #[tokio::test]
    async fn exhausted_chain_surfaces_providers_exhausted_with_attempts() {
        let registry = Arc::new(ModelRegistry::new(vec![capability("a", Provider::OpenAI, 128_000)]));
        let mock = Arc::new(MockProviderClient::new(vec![Scripted::Failure(RouterError::RateLimited {
            provider: "openai".into(),
            retry_after: None,
        })]));
        let (orchestrator, _ledger) = build_orchestrator(registry, mock, &["openai"]);

        let request = RouteRequest {
            prompt: "hello".to_string(),
            ..Default::default()
        };
        let result = orchestrator.route_request(request, CancellationToken::new()).await;
        match result {
            Err(RouterError::ProvidersExhausted { attempts }) => {
                assert_eq!(attempts.len(), 1);
                assert_eq!(attempts[0].0, "a");
            }
            other => panic!("expected providers_exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_request_is_not_retried_with_a_different_model() {
        let registry = Arc::new(ModelRegistry::new(vec![
            capability("a", Provider::OpenAI, 128_000),
            capability("b", Provider::Local, 128_000),
        ]));
        let mock = Arc::new(MockProviderClient::new(vec![Scripted::Failure(RouterError::InvalidRequest(
            "bad prompt".to_string(),
        ))]));
        let (orchestrator, ledger) = build_orchestrator(registry, mock, &["openai", "local"]);

        let request = RouteRequest {
            prompt: "hello".to_string(),
            ..Default::default()
        };
        let result = orchestrator.route_request(request, CancellationToken::new()).await;
        assert!(matches!(result, Err(RouterError::InvalidRequest(_))));
        // One zero-token record for the single rejected attempt, no fallback call made.
        assert_eq!(ledger.len().await, 1);
    }
}
