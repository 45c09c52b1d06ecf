// crates/fluent-engines/src/selector.rs

//! Produces a primary model id and an ordered fallback chain by running
//! the Scorer over the Registry. Both operations are pure functions of
//! their inputs — no shared state is mutated, so `fallback_chain` can be
//! called repeatedly with different exclusion sets and stay consistent
//! with a single `select` call (spec §8 round-trip property).

use crate::scorer;
use fluent_core::config::{ModelGuideOverrides, ScorerWeights};
use fluent_core::error::{RouterError, RouterResult};
use fluent_core::registry::ModelRegistry;
use fluent_core::types::{Provider, TaskRequirements};
use std::collections::HashSet;

pub struct Selector {
    registry: std::sync::Arc<ModelRegistry>,
    weights: ScorerWeights,
    overrides: ModelGuideOverrides,
}

impl Selector {
    pub fn new(registry: std::sync::Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            weights: ScorerWeights::default(),
            overrides: ModelGuideOverrides::default(),
        }
    }

    pub fn with_weights(mut self, weights: ScorerWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_overrides(mut self, overrides: ModelGuideOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// All non-excluded candidates satisfying the hard filters, ordered by
    /// the selection policy: preferred-list entries for this task type
    /// first (in configured order, if they pass the filters), then the
    /// remaining candidates sorted by descending score with the Scorer's
    /// lexicographic tie-break.
    fn ordered_candidates(
        &self,
        requirements: &TaskRequirements,
        excluded: &HashSet<String>,
    ) -> Vec<String> {
        let blocked: HashSet<&str> = self
            .overrides
            .blocked_model_ids
            .iter()
            .map(String::as_str)
            .collect();

        let mut scored: Vec<(String, f64)> = self
            .registry
            .list()
            .iter()
            .filter(|m| !excluded.contains(&m.id) && !blocked.contains(m.id.as_str()))
            .filter_map(|m| {
                scorer::score(m, requirements, &self.weights)
                    .ok()
                    .map(|s| (m.id.clone(), s))
            })
            .collect();

        scored.sort_by(|(id_a, score_a), (id_b, score_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let cap_a = self.registry.get(id_a).unwrap();
                    let cap_b = self.registry.get(id_b).unwrap();
                    let key_a = scorer::tie_break_key(
                        cap_a,
                        self.registry.insertion_index(id_a).unwrap_or(usize::MAX),
                    );
                    let key_b = scorer::tie_break_key(
                        cap_b,
                        self.registry.insertion_index(id_b).unwrap_or(usize::MAX),
                    );
                    key_a.cmp(&key_b)
                })
        });

        let mut ordered: Vec<String> = Vec::with_capacity(scored.len());
        let scored_ids: HashSet<&str> = scored.iter().map(|(id, _)| id.as_str()).collect();

        let task_key = format!("{:?}", requirements.task_type);
        if let Some(preferred) = self.overrides.preferred_by_task.get(&task_key) {
            for id in preferred {
                if scored_ids.contains(id.as_str()) {
                    ordered.push(id.clone());
                }
            }
        }
        for (id, _) in scored {
            if !ordered.contains(&id) {
                ordered.push(id);
            }
        }
        ordered
    }

    /// Runs the Scorer over the registry and returns the top candidate. If
    /// the first pass finds nothing, performs the one constraint-relaxation
    /// pass from spec §4.4 (halve reasoning/coding thresholds, drop cost
    /// ceiling) before giving up with `NoCandidates`.
    pub fn select(&self, requirements: &TaskRequirements) -> RouterResult<String> {
        let excluded = HashSet::new();
        let candidates = self.ordered_candidates(requirements, &excluded);
        if let Some(top) = candidates.into_iter().next() {
            return Ok(top);
        }

        let relaxed = requirements.relaxed();
        let candidates = self.ordered_candidates(&relaxed, &excluded);
        candidates.into_iter().next().ok_or(RouterError::NoCandidates)
    }

    /// Returns the remaining candidates in score order, excluding
    /// `failed_id` and everything in `already_tried`. When `demote_provider`
    /// is set (the primary failed with a provider-level error and shared a
    /// provider with the runner-up), any subsequent candidate from that
    /// provider is moved to the end of the chain rather than dropped.
    pub fn fallback_chain(
        &self,
        requirements: &TaskRequirements,
        failed_id: &str,
        already_tried: &[String],
        demote_provider: Option<Provider>,
    ) -> Vec<String> {
        let mut excluded: HashSet<String> = already_tried.iter().cloned().collect();
        excluded.insert(failed_id.to_string());

        let candidates = self.ordered_candidates(requirements, &excluded);

        match demote_provider {
            None => candidates,
            Some(provider) => {
                let (same_provider, rest): (Vec<_>, Vec<_>) = candidates
                    .into_iter()
                    .partition(|id| self.registry.get(id).map(|m| m.provider) == Some(provider));
                rest.into_iter().chain(same_provider).collect()
            }
        }
    }

    /// The top `n` distinct candidate model ids for `requirements`, in
    /// score order. If fewer than `n` candidates pass the hard filters,
    /// returns all of them — consensus callers asking for more voters than
    /// the registry holds get every eligible model rather than an error
    /// (spec §8 boundary behavior).
    pub fn top_n(&self, requirements: &TaskRequirements, n: usize) -> Vec<String> {
        let excluded = HashSet::new();
        let candidates = self.ordered_candidates(requirements, &excluded);
        candidates.into_iter().take(n).collect()
    }

    /// Whether the top two scored candidates for `requirements` share a
    /// provider — the cross-provider demotion trigger condition in spec §4.4.
    pub fn top_two_share_provider(&self, requirements: &TaskRequirements) -> Option<Provider> {
        let excluded = HashSet::new();
        let candidates = self.ordered_candidates(requirements, &excluded);
        let first = candidates.first().and_then(|id| self.registry.get(id))?;
        let second = candidates.get(1).and_then(|id| self.registry.get(id))?;
        if first.provider == second.provider {
            Some(first.provider)
        } else {
            None
        }
    }
}
