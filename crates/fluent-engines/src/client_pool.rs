// crates/fluent-engines/src/client_pool.rs

//! Lazily instantiates and caches one provider client per provider id.
//! Generalizes the teacher's per-host `reqwest::Client` connection pool
//! into a pool keyed by `Provider` and caching `Arc<dyn ProviderClient>`.

use crate::providers::local::LocalClient;
use crate::providers::mock::MockProviderClient;
use crate::providers::{anthropic::AnthropicClient, openai::OpenAiClient, ProviderClient};
use fluent_core::credentials::CredentialProvider;
use fluent_core::error::{RouterError, RouterResult};
use fluent_core::types::Provider;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Builds the concrete `ProviderClient` for a provider once credentials
/// are in hand. Pluggable so tests can swap in an all-mock factory without
/// touching the pool's caching/locking logic.
pub trait ProviderClientFactory: Send + Sync {
    fn create(&self, provider: Provider, credentials: HashMap<String, String>) -> Arc<dyn ProviderClient>;
}

pub struct DefaultProviderClientFactory;

impl ProviderClientFactory for DefaultProviderClientFactory {
    fn create(&self, provider: Provider, credentials: HashMap<String, String>) -> Arc<dyn ProviderClient> {
        match provider {
            Provider::OpenAI | Provider::Xai | Provider::Azure => {
                Arc::new(OpenAiClient::new(credentials))
            }
            Provider::Anthropic => Arc::new(AnthropicClient::new(credentials)),
            Provider::Google | Provider::Bedrock => Arc::new(OpenAiClient::new(credentials)),
            Provider::Local => Arc::new(LocalClient::new(credentials)),
        }
    }
}

/// A factory that always returns the same mock client, for tests that
/// want to exercise the pool's caching/sharing behavior without standing
/// up real HTTP clients.
pub struct MockClientFactory(pub Arc<MockProviderClient>);

impl ProviderClientFactory for MockClientFactory {
    fn create(&self, _provider: Provider, _credentials: HashMap<String, String>) -> Arc<dyn ProviderClient> {
        self.0.clone()
    }
}

/// At most one client per provider, shared by all in-flight requests to
/// that provider. Unavailability (missing credentials) is sticky for the
/// process lifetime once recorded.
pub struct ClientPool {
    credential_provider: Arc<dyn CredentialProvider>,
    factory: Arc<dyn ProviderClientFactory>,
    clients: RwLock<HashMap<Provider, Arc<dyn ProviderClient>>>,
    unavailable: RwLock<std::collections::HashSet<Provider>>,
    creation_locks: Mutex<HashMap<Provider, Arc<Mutex<()>>>>,
}

impl ClientPool {
    pub fn new(credential_provider: Arc<dyn CredentialProvider>) -> Self {
        Self::with_factory(credential_provider, Arc::new(DefaultProviderClientFactory))
    }

    pub fn with_factory(
        credential_provider: Arc<dyn CredentialProvider>,
        factory: Arc<dyn ProviderClientFactory>,
    ) -> Self {
        Self {
            credential_provider,
            factory,
            clients: RwLock::new(HashMap::new()),
            unavailable: RwLock::new(std::collections::HashSet::new()),
            creation_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the shared client for `provider`, creating it on first use.
    /// Safe to call concurrently: a lazy-init race results in at most one
    /// client being created, the loser discarding its instance and reusing
    /// the winner's from the cache.
    pub async fn get(&self, provider: Provider) -> RouterResult<Arc<dyn ProviderClient>> {
        if self.unavailable.read().await.contains(&provider) {
            return Err(RouterError::ProviderUnavailable {
                provider: provider.to_string(),
            });
        }
        if let Some(client) = self.clients.read().await.get(&provider) {
            return Ok(client.clone());
        }

        let provider_lock = {
            let mut locks = self.creation_locks.lock().await;
            locks
                .entry(provider)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = provider_lock.lock().await;

        // Re-check after acquiring the per-provider lock: another task may
        // have finished creation while we were waiting.
        if let Some(client) = self.clients.read().await.get(&provider) {
            return Ok(client.clone());
        }

        match self.credential_provider.get_credentials(&provider.to_string()) {
            None => {
                self.unavailable.write().await.insert(provider);
                Err(RouterError::ProviderUnavailable {
                    provider: provider.to_string(),
                })
            }
            Some(credentials) => {
                let client = self.factory.create(provider, credentials);
                self.clients.write().await.insert(provider, client.clone());
                Ok(client)
            }
        }
    }

    /// Drains every cached client, calling its `close()` hook, and clears
    /// the cache. Unavailability markers are preserved (there's no reason
    /// to re-attempt a provider known to lack credentials).
    pub async fn shutdown(&self) {
        let clients = {
            let mut guard = self.clients.write().await;
            std::mem::take(&mut *guard)
        };
        for client in clients.values() {
            client.close().await;
        }
    }

    pub async fn is_unavailable(&self, provider: Provider) -> bool {
        self.unavailable.read().await.contains(&provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockProviderClient;
    use fluent_core::credentials::StaticCredentialProvider;
    use std::collections::HashMap;

    #[tokio::test]
    async fn get_creates_client_once_and_caches_it() {
        let mut creds = HashMap::new();
        creds.insert("api_key".to_string(), "k".to_string());
        let credential_provider = Arc::new(StaticCredentialProvider::new().with_provider("openai", creds));
        let mock = Arc::new(MockProviderClient::always_success());
        let pool = ClientPool::with_factory(credential_provider, Arc::new(MockClientFactory(mock)));

        let first = pool.get(Provider::OpenAI).await.unwrap();
        let second = pool.get(Provider::OpenAI).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn missing_credentials_marks_provider_unavailable() {
        let credential_provider = Arc::new(StaticCredentialProvider::new());
        let pool = ClientPool::new(credential_provider);

        let result = pool.get(Provider::OpenAI).await;
        assert!(matches!(result, Err(RouterError::ProviderUnavailable { .. })));
        assert!(pool.is_unavailable(Provider::OpenAI).await);

        // Sticky: a second attempt fails immediately without re-querying
        // the credential provider.
        let second = pool.get(Provider::OpenAI).await;
        assert!(matches!(second, Err(RouterError::ProviderUnavailable { .. })));
    }

    #[tokio::test]
    async fn concurrent_get_calls_share_one_client() {
        let mut creds = HashMap::new();
        creds.insert("api_key".to_string(), "k".to_string());
        let credential_provider = Arc::new(StaticCredentialProvider::new().with_provider("anthropic", creds));
        let mock = Arc::new(MockProviderClient::always_success());
        let pool = Arc::new(ClientPool::with_factory(
            credential_provider,
            Arc::new(MockClientFactory(mock)),
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move { pool.get(Provider::Anthropic).await.unwrap() }));
        }
        let results: Vec<_> = futures_join_all(handles).await;
        let first_ptr = Arc::as_ptr(&results[0]);
        for client in &results[1..] {
            assert_eq!(Arc::as_ptr(client), first_ptr);
        }
    }

    async fn futures_join_all(
        handles: Vec<tokio::task::JoinHandle<Arc<dyn ProviderClient>>>,
    ) -> Vec<Arc<dyn ProviderClient>> {
        let mut out = Vec::with_capacity(handles.len());
        for h in handles {
            out.push(h.await.unwrap());
        }
        out
    }
}
