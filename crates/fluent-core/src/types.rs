// crates/fluent-core/src/types.rs

//! Core data types shared by every routing component.
//!
//! A [`ModelCapability`] is an immutable registry entry built once at
//! startup. A [`TaskRequirements`] is derived per-request by the analyzer
//! and discarded after selection. An [`ApiResponse`] is the normalized
//! shape every provider client returns, regardless of that provider's
//! wire format.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The provider a model is hosted by.
///
/// Closed set: selection, pooling, and fallback demotion all key off this
/// enum rather than a free-form string so "same provider" comparisons
/// used by the selector's cross-provider demotion rule can't be fooled by
/// case or whitespace differences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    #[serde(rename = "openai")]
    OpenAI,
    Anthropic,
    Google,
    Xai,
    Azure,
    Bedrock,
    Local,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Provider::OpenAI => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
            Provider::Xai => "xai",
            Provider::Azure => "azure",
            Provider::Bedrock => "bedrock",
            Provider::Local => "local",
        };
        write!(f, "{s}")
    }
}

/// Immutable capability record for one registered model.
///
/// Constructed once at registry load time and never mutated afterwards;
/// changing a model's capabilities means swapping in a whole new registry
/// (see [`crate::registry::ModelRegistry`]).
///
/// # Examples
///
/// ```rust
/// use fluent_core::types::{ModelCapability, Provider};
///
/// let gpt4o = ModelCapability {
///     id: "gpt-4o".to_string(),
///     provider: Provider::OpenAI,
///     api_name: "gpt-4o-2024-08-06".to_string(),
///     context_window: 128_000,
///     input_cost: 2.50,
///     output_cost: 10.00,
///     reasoning_score: 85,
///     coding_score: 88,
///     speed_rating: 7,
///     supports_vision: true,
///     supports_function_calling: true,
///     blocked: false,
/// };
///
/// assert_eq!(gpt4o.quality_mean(), 86.5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCapability {
    pub id: String,
    pub provider: Provider,
    /// Wire identifier the provider's API expects (e.g. `"gpt-4o-2024-08-06"`).
    pub api_name: String,
    pub context_window: u32,
    /// USD per million input tokens.
    pub input_cost: f64,
    /// USD per million output tokens.
    pub output_cost: f64,
    /// 0-100.
    pub reasoning_score: u8,
    /// 0-100.
    pub coding_score: u8,
    /// 0-10.
    pub speed_rating: u8,
    pub supports_vision: bool,
    pub supports_function_calling: bool,
    pub blocked: bool,
}

impl ModelCapability {
    /// Mean of reasoning and coding scores, used by the `balanced` and
    /// `speed` scoring formulas as "quality-mean".
    pub fn quality_mean(&self) -> f64 {
        (self.reasoning_score as f64 + self.coding_score as f64) / 2.0
    }

    /// Average of input/output cost per million tokens.
    pub fn avg_cost(&self) -> f64 {
        (self.input_cost + self.output_cost) / 2.0
    }

    pub fn is_local(&self) -> bool {
        matches!(self.provider, Provider::Local) && self.avg_cost() == 0.0
    }
}

/// The kind of work a prompt represents, as derived by the task analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    CodeGeneration,
    Debugging,
    ArchitecturalDesign,
    Documentation,
    Testing,
    DataAnalysis,
    Reasoning,
    Vision,
    General,
}

impl Default for TaskType {
    fn default() -> Self {
        TaskType::General
    }
}

/// Caller-expressed tradeoff between answer quality, latency, and cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Quality,
    Speed,
    Cost,
    Balanced,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Balanced
    }
}

/// Requirements derived from a single prompt; discarded after selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequirements {
    pub task_type: TaskType,
    pub min_context: u32,
    pub max_cost: Option<f64>,
    pub min_reasoning: u8,
    pub min_coding: u8,
    pub priority: Priority,
}

impl TaskRequirements {
    /// Constraint-relaxation pass used when the first scoring pass finds
    /// zero candidates: halves the reasoning/coding thresholds and drops
    /// the cost ceiling, leaving context and priority untouched.
    pub fn relaxed(&self) -> Self {
        Self {
            task_type: self.task_type,
            min_context: self.min_context,
            max_cost: None,
            min_reasoning: self.min_reasoning / 2,
            min_coding: self.min_coding / 2,
            priority: self.priority,
        }
    }
}

/// A role in a chat-style conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single message in the conversation sent to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A structured function-call request surfaced by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Why a provider stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    Error,
}

/// Token usage for a single provider call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Normalized response every provider client returns, regardless of wire
/// format. Providers translate their own shape into this struct at the
/// boundary (see `fluent-engines::providers`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub content: String,
    pub usage: Usage,
    pub model_id: String,
    pub finish_reason: FinishReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Options threaded through to a provider call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub tool_definitions: Vec<ToolDefinition>,
    pub stream: bool,
    /// Unset by default: context-exceeded recovery promotes to a
    /// larger-context model first; truncation only runs when a caller
    /// explicitly opts in here.
    pub truncate_strategy: Option<TruncateStrategy>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum TruncateStrategy {
    DropOldestMessages,
}

/// Schema for a tool the model may choose to invoke.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// One entry in the append-only cost ledger.
///
/// Exactly one record is produced per outer provider call, including
/// failed or cancelled ones (with zero tokens), so the ledger is the
/// authoritative usage record regardless of call outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRecord {
    pub model_id: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_usd: f64,
    /// RFC 3339 timestamp.
    pub timestamp: String,
    pub request_id: String,
    /// Free-form note, e.g. `"cancelled"` for aborted attempts.
    pub note: Option<String>,
}

/// Aggregate usage report returned by `get_cost_report`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostReport {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cost_usd: f64,
    pub per_model: HashMap<String, ModelCostBreakdown>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelCostBreakdown {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    pub requests: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_mean_averages_reasoning_and_coding() {
        let cap = ModelCapability {
            id: "a".into(),
            provider: Provider::OpenAI,
            api_name: "a".into(),
            context_window: 8_000,
            input_cost: 1.0,
            output_cost: 2.0,
            reasoning_score: 90,
            coding_score: 70,
            speed_rating: 5,
            supports_vision: false,
            supports_function_calling: true,
            blocked: false,
        };
        assert_eq!(cap.quality_mean(), 80.0);
        assert_eq!(cap.avg_cost(), 1.5);
    }

    #[test]
    fn relaxed_requirements_halve_thresholds_and_drop_cost() {
        let req = TaskRequirements {
            task_type: TaskType::Reasoning,
            min_context: 1_000,
            max_cost: Some(5.0),
            min_reasoning: 90,
            min_coding: 80,
            priority: Priority::Balanced,
        };
        let relaxed = req.relaxed();
        assert_eq!(relaxed.min_reasoning, 45);
        assert_eq!(relaxed.min_coding, 40);
        assert_eq!(relaxed.max_cost, None);
        assert_eq!(relaxed.min_context, 1_000);
    }

    #[test]
    fn provider_display_is_snake_case() {
        assert_eq!(Provider::OpenAI.to_string(), "openai");
        assert_eq!(Provider::Google.to_string(), "google");
    }
}
