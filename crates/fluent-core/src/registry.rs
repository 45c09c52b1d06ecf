// crates/fluent-core/src/registry.rs

//! Immutable lookup of model capability records, built once at startup.

use crate::types::ModelCapability;
use std::collections::HashMap;

/// Read-only registry of model capabilities, safe for concurrent readers
/// without locking — nothing in this type is ever mutated after
/// construction. `list()` and `filter()` preserve insertion order from
/// the source config, which the Scorer's tie-break rule relies on.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Vec<ModelCapability>,
    index: HashMap<String, usize>,
}

impl ModelRegistry {
    /// Builds a registry from an already-parsed list of capabilities.
    /// The registry itself performs no I/O; a loader (e.g.
    /// `registry_config::load_registry_yaml`) is responsible for getting
    /// a `Vec<ModelCapability>` from disk or a config service.
    pub fn new(models: Vec<ModelCapability>) -> Self {
        let index = models
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id.clone(), i))
            .collect();
        Self { models, index }
    }

    /// O(1) lookup by id.
    pub fn get(&self, id: &str) -> Option<&ModelCapability> {
        self.index.get(id).map(|&i| &self.models[i])
    }

    /// All capabilities, in registration order.
    pub fn list(&self) -> &[ModelCapability] {
        &self.models
    }

    /// Capabilities matching `predicate`, in registration order.
    pub fn filter<F>(&self, predicate: F) -> Vec<&ModelCapability>
    where
        F: Fn(&ModelCapability) -> bool,
    {
        self.models.iter().filter(|m| predicate(m)).collect()
    }

    /// Position of `id` in registration order, used by the Scorer's
    /// lowest-priority tie-break rule.
    pub fn insertion_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Provider;

    fn model(id: &str, provider: Provider) -> ModelCapability {
        ModelCapability {
            id: id.to_string(),
            provider,
            api_name: id.to_string(),
            context_window: 8_000,
            input_cost: 1.0,
            output_cost: 2.0,
            reasoning_score: 80,
            coding_score: 80,
            speed_rating: 5,
            supports_vision: false,
            supports_function_calling: true,
            blocked: false,
        }
    }

    #[test]
    fn get_is_idempotent() {
        let registry = ModelRegistry::new(vec![model("a", Provider::OpenAI)]);
        let first = registry.get("a").cloned();
        let second = registry.get("a").cloned();
        assert_eq!(first.unwrap().id, second.unwrap().id);
    }

    #[test]
    fn get_returns_none_for_missing_id() {
        let registry = ModelRegistry::new(vec![model("a", Provider::OpenAI)]);
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn list_preserves_insertion_order() {
        let registry = ModelRegistry::new(vec![
            model("a", Provider::OpenAI),
            model("b", Provider::Anthropic),
            model("c", Provider::Google),
        ]);
        let ids: Vec<_> = registry.list().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(registry.insertion_index("b"), Some(1));
    }

    #[test]
    fn filter_selects_matching_models_only() {
        let registry = ModelRegistry::new(vec![
            model("a", Provider::OpenAI),
            model("b", Provider::Anthropic),
        ]);
        let openai_only = registry.filter(|m| m.provider == Provider::OpenAI);
        assert_eq!(openai_only.len(), 1);
        assert_eq!(openai_only[0].id, "a");
    }
}
