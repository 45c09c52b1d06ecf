// crates/fluent-engines/src/analyzer.rs

//! Derives Task Requirements from a raw prompt: a cheap heuristic tier that
//! always runs, plus an optional router-LLM tier consulted only when the
//! heuristic result is unconfident (`TaskType::General`). Results are
//! cached by a SHA-256 of the prompt with a bounded LRU.

use fluent_core::types::{Priority, TaskRequirements, TaskType};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Chars-per-token estimate used to derive `min_context` from prompt
/// length, times a safety margin so near-boundary prompts don't get
/// rejected by models whose context window matches the raw estimate.
const CHARS_PER_TOKEN: f64 = 4.0;
const CONTEXT_SAFETY_FACTOR: f64 = 1.2;

const DEFAULT_CACHE_SIZE: usize = 256;

/// Optional second tier: a constrained classification call to a small,
/// fast model. Absent by default, so the analyzer runs fully
/// heuristic-only without any network dependency.
#[async_trait::async_trait]
pub trait RouterClassifier: Send + Sync {
    async fn classify(&self, prompt: &str) -> anyhow::Result<TaskType>;
}

struct HeuristicRule {
    pattern: Regex,
    task_type: TaskType,
    min_reasoning: u8,
    min_coding: u8,
}

static RULES: Lazy<Vec<HeuristicRule>> = Lazy::new(|| {
    let rule = |pattern: &str, task_type: TaskType, min_reasoning: u8, min_coding: u8| {
        HeuristicRule {
            pattern: Regex::new(pattern).expect("static heuristic pattern is valid"),
            task_type,
            min_reasoning,
            min_coding,
        }
    };
    vec![
        rule(
            r"(?i)\b(image|photo|screenshot|picture|diagram)\b.*\b(attached|shown|below)\b",
            TaskType::Vision,
            40,
            20,
        ),
        rule(
            r"(?i)\bwhy (does|is|did).*(fail|crash|break|throw)|traceback|stack trace|NullPointerException|segfault",
            TaskType::Debugging,
            70,
            60,
        ),
        rule(
            r#"(?m)^\s*(def |class |fn |function |public\s+\w+\s+\w+\(|#include|import )"#,
            TaskType::CodeGeneration,
            50,
            70,
        ),
        rule(
            r"(?i)\bwrite (a |some )?(unit |integration )?tests?\b|\bassert(ions)?\b|\btest coverage\b",
            TaskType::Testing,
            40,
            65,
        ),
        rule(
            r"(?i)\bdocument(ation)?\b|\bREADME\b|\bdocstring\b|\bwrite (the )?docs\b",
            TaskType::Documentation,
            30,
            30,
        ),
        rule(
            r"(?i)\barchitect(ure)?\b|\bsystem design\b|\btrade-?offs?\b|\bscal(e|ing|ability)\b|\bmicroservices?\b",
            TaskType::ArchitecturalDesign,
            75,
            40,
        ),
        rule(
            r"(?i)\banalyz[e|ing]\b.*\bdata\b|\bdataset\b|\bcsv\b|\bstatistic(s|al)?\b|\bcorrelation\b",
            TaskType::DataAnalysis,
            55,
            30,
        ),
        rule(
            r"(?i)\bprove\b|\bexplain why\b|\breason (about|through)\b|\bstep by step\b|\bfirst principles\b",
            TaskType::Reasoning,
            70,
            20,
        ),
    ]
});

fn heuristic_tier(prompt: &str, task_type_override: Option<TaskType>) -> TaskRequirements {
    let (task_type, min_reasoning, min_coding) = if let Some(t) = task_type_override {
        (t, 0, 0)
    } else {
        RULES
            .iter()
            .find(|r| r.pattern.is_match(prompt))
            .map(|r| (r.task_type, r.min_reasoning, r.min_coding))
            .unwrap_or((TaskType::General, 0, 0))
    };

    let estimated_tokens = (prompt.len() as f64 / CHARS_PER_TOKEN) * CONTEXT_SAFETY_FACTOR;

    TaskRequirements {
        task_type,
        min_context: estimated_tokens.ceil() as u32,
        max_cost: None,
        min_reasoning,
        min_coding,
        priority: Priority::Balanced,
    }
}

fn cache_key(prompt: &str, task_type_override: Option<TaskType>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    if let Some(t) = task_type_override {
        hasher.update(format!("{t:?}").as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

pub struct TaskAnalyzer {
    router_classifier: Option<Arc<dyn RouterClassifier>>,
    cache: Mutex<lru::LruCache<String, TaskRequirements>>,
}

impl TaskAnalyzer {
    pub fn new() -> Self {
        Self::with_cache_size(DEFAULT_CACHE_SIZE)
    }

    pub fn with_cache_size(size: usize) -> Self {
        Self {
            router_classifier: None,
            cache: Mutex::new(lru::LruCache::new(
                std::num::NonZeroUsize::new(size.max(1)).expect("cache size is non-zero"),
            )),
        }
    }

    pub fn with_router_classifier(mut self, classifier: Arc<dyn RouterClassifier>) -> Self {
        self.router_classifier = Some(classifier);
        self
    }

    /// Derives requirements for `prompt`. A cache hit short-circuits before
    /// any router-LLM call, so repeated calls for the same prompt never
    /// touch the network (spec §8 analyzer cache property).
    pub async fn analyze(
        &self,
        prompt: &str,
        task_type_override: Option<TaskType>,
    ) -> TaskRequirements {
        let key = cache_key(prompt, task_type_override);
        if let Some(cached) = self.cache.lock().await.get(&key) {
            return cached.clone();
        }

        let mut requirements = heuristic_tier(prompt, task_type_override);

        if task_type_override.is_none() && requirements.task_type == TaskType::General {
            if let Some(classifier) = &self.router_classifier {
                match classifier.classify(prompt).await {
                    Ok(task_type) => requirements.task_type = task_type,
                    Err(err) => {
                        // Never fatal: degrade to the heuristic-only result.
                        warn!("router-LLM classification tier failed, falling back to heuristic: {err}");
                    }
                }
            }
        }

        self.cache.lock().await.put(key, requirements.clone());
        requirements
    }
}

impl Default for TaskAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn code_generation_prompt_sets_high_coding_floor() {
        let analyzer = TaskAnalyzer::new();
        let req = analyzer
            .analyze("def fibonacci(n):\n    pass", None)
            .await;
        assert_eq!(req.task_type, TaskType::CodeGeneration);
        assert!(req.min_coding >= 70);
    }

    #[tokio::test]
    async fn debugging_prompt_sets_high_reasoning_floor() {
        let analyzer = TaskAnalyzer::new();
        let req = analyzer
            .analyze("why does this fail with a traceback on line 12", None)
            .await;
        assert_eq!(req.task_type, TaskType::Debugging);
        assert!(req.min_reasoning >= 70);
    }

    #[tokio::test]
    async fn unmatched_prompt_defaults_to_general() {
        let analyzer = TaskAnalyzer::new();
        let req = analyzer.analyze("hello there", None).await;
        assert_eq!(req.task_type, TaskType::General);
    }

    #[tokio::test]
    async fn caller_override_bypasses_heuristic_matching() {
        let analyzer = TaskAnalyzer::new();
        let req = analyzer
            .analyze("def foo(): pass", Some(TaskType::Documentation))
            .await;
        assert_eq!(req.task_type, TaskType::Documentation);
    }

    #[tokio::test]
    async fn prompt_length_drives_min_context() {
        let analyzer = TaskAnalyzer::new();
        let long_prompt = "x".repeat(4000);
        let req = analyzer.analyze(&long_prompt, None).await;
        assert!(req.min_context >= 1000);
    }

    #[tokio::test]
    async fn cache_hit_returns_identical_result_without_classifier_call() {
        struct FailingClassifier;
        #[async_trait::async_trait]
        impl RouterClassifier for FailingClassifier {
            async fn classify(&self, _prompt: &str) -> anyhow::Result<TaskType> {
                panic!("classifier should not be called on a cache hit");
            }
        }

        let analyzer = TaskAnalyzer::new();
        let first = analyzer.analyze("hello there", None).await;
        let analyzer = analyzer.with_router_classifier(Arc::new(FailingClassifier));
        let second = analyzer.analyze("hello there", None).await;
        assert_eq!(first.task_type, second.task_type);
        assert_eq!(first.min_context, second.min_context);
    }

    #[tokio::test]
    async fn router_tier_failure_degrades_to_heuristic_result() {
        struct FailingClassifier;
        #[async_trait::async_trait]
        impl RouterClassifier for FailingClassifier {
            async fn classify(&self, _prompt: &str) -> anyhow::Result<TaskType> {
                Err(anyhow::anyhow!("classifier unavailable"))
            }
        }
        let analyzer = TaskAnalyzer::new().with_router_classifier(Arc::new(FailingClassifier));
        let req = analyzer.analyze("a vague prompt with no cues", None).await;
        assert_eq!(req.task_type, TaskType::General);
    }

    #[tokio::test]
    async fn router_tier_overrides_general_classification() {
        struct FixedClassifier;
        #[async_trait::async_trait]
        impl RouterClassifier for FixedClassifier {
            async fn classify(&self, _prompt: &str) -> anyhow::Result<TaskType> {
                Ok(TaskType::Reasoning)
            }
        }
        let analyzer = TaskAnalyzer::new().with_router_classifier(Arc::new(FixedClassifier));
        let req = analyzer.analyze("a vague prompt with no cues", None).await;
        assert_eq!(req.task_type, TaskType::Reasoning);
    }
}
