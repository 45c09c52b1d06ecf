// crates/fluent-engines/src/scorer.rs

//! Pure scoring function from (capability, requirements) to a real number,
//! with hard filters that reject candidates outright. No I/O, no locks —
//! safe to call from any thread, any number of times, with identical
//! results (spec §8 "scoring is deterministic").

use fluent_core::config::ScorerWeights;
use fluent_core::types::{ModelCapability, Priority, TaskRequirements, TaskType};

/// Why a candidate was excluded from selection, in hard-filter order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Blocked,
    ContextTooSmall,
    MissingVision,
    CostExceeded,
    ReasoningTooLow,
    CodingTooLow,
}

/// Applies the five hard filters from spec §4.3 in order, short-circuiting
/// on the first one that fails.
pub fn hard_filter(
    capability: &ModelCapability,
    requirements: &TaskRequirements,
) -> Result<(), RejectReason> {
    if capability.blocked {
        return Err(RejectReason::Blocked);
    }
    if capability.context_window < requirements.min_context {
        return Err(RejectReason::ContextTooSmall);
    }
    if requirements.task_type == TaskType::Vision && !capability.supports_vision {
        return Err(RejectReason::MissingVision);
    }
    if let Some(max_cost) = requirements.max_cost {
        if capability.avg_cost() > max_cost {
            return Err(RejectReason::CostExceeded);
        }
    }
    if capability.reasoning_score < requirements.min_reasoning {
        return Err(RejectReason::ReasoningTooLow);
    }
    if capability.coding_score < requirements.min_coding {
        return Err(RejectReason::CodingTooLow);
    }
    Ok(())
}

/// Normalizes `avg_cost` into a roughly 0-10 band the `balanced` formula
/// combines with reasoning/speed. Local (zero-cost) models normalize to 0,
/// i.e. the best possible cost contribution.
fn normalized_cost(capability: &ModelCapability) -> f64 {
    // Observed frontier pricing tops out around $75/M tokens; anything
    // above that still clamps to the worst band rather than going negative
    // downstream.
    (capability.avg_cost() / 75.0 * 10.0).min(10.0)
}

/// Scores one capability against requirements using the weight vector for
/// `requirements.priority`. Returns `Err` if any hard filter rejects the
/// candidate; callers should treat a rejected candidate as absent from the
/// pool entirely, never as a low score.
pub fn score(
    capability: &ModelCapability,
    requirements: &TaskRequirements,
    weights: &ScorerWeights,
) -> Result<f64, RejectReason> {
    hard_filter(capability, requirements)?;

    let quality_mean = capability.quality_mean();
    let value = match requirements.priority {
        Priority::Quality => {
            weights.quality_reasoning * capability.reasoning_score as f64
                + weights.quality_coding * capability.coding_score as f64
        }
        Priority::Speed => {
            // speed_rating is 0-10, quality_mean is 0-100; scale speed_rating
            // up by 10x first so the weight vector's magnitudes (spec §4.3:
            // 0.8/0.2) apply to two terms on the same 0-100 scale instead of
            // silently favoring quality_mean by an order of magnitude.
            weights.speed_speed * capability.speed_rating as f64 * 10.0
                + weights.speed_quality_mean * quality_mean
        }
        Priority::Cost => {
            let cost_term = if capability.is_local() {
                // Local models win all cost ties outright (spec §4.3).
                f64::MAX / 2.0
            } else {
                -1.0 * normalized_cost(capability)
            };
            cost_term + 0.3 * quality_mean
        }
        Priority::Balanced => {
            // Same 0-10 -> 0-100 scaling as the `speed` arm above, so all
            // three terms (quality_mean, normalized cost, speed_rating) sit
            // on a comparable scale before the weight vector is applied.
            weights.balanced_quality_mean * quality_mean
                + weights.balanced_cost * (10.0 - normalized_cost(capability))
                + weights.balanced_speed * capability.speed_rating as f64 * 10.0
        }
    };
    Ok(value)
}

/// Lexicographic tie-break key for candidates with equal scores: higher
/// reasoning first, then higher context window, then lower insertion index
/// (earlier registration wins). Sorting candidates by `(Reverse(score),
/// tie_break_key)` yields the deterministic ordering spec §4.3 requires.
pub fn tie_break_key(capability: &ModelCapability, insertion_index: usize) -> (i32, i64, usize) {
    (
        -(capability.reasoning_score as i32),
        -(capability.context_window as i64),
        insertion_index,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluent_core::types::Provider;

    fn model(id: &str, reasoning: u8, coding: u8, cost: f64, local: bool) -> ModelCapability {
        ModelCapability {
            id: id.to_string(),
            provider: if local {
                Provider::Local
            } else {
                Provider::OpenAI
            },
            api_name: id.to_string(),
            context_window: 128_000,
            input_cost: cost,
            output_cost: cost,
            reasoning_score: reasoning,
            coding_score: coding,
            speed_rating: 5,
            supports_vision: false,
            supports_function_calling: true,
            blocked: false,
        }
    }

    fn requirements(priority: Priority) -> TaskRequirements {
        TaskRequirements {
            task_type: TaskType::General,
            min_context: 0,
            max_cost: None,
            min_reasoning: 0,
            min_coding: 0,
            priority,
        }
    }

    #[test]
    fn blocked_model_is_rejected() {
        let mut cap = model("a", 90, 90, 1.0, false);
        cap.blocked = true;
        let req = requirements(Priority::Balanced);
        assert_eq!(
            hard_filter(&cap, &req).unwrap_err(),
            RejectReason::Blocked
        );
    }

    #[test]
    fn context_window_too_small_is_rejected() {
        let cap = model("a", 90, 90, 1.0, false);
        let mut req = requirements(Priority::Balanced);
        req.min_context = 1_000_000;
        assert_eq!(
            hard_filter(&cap, &req).unwrap_err(),
            RejectReason::ContextTooSmall
        );
    }

    #[test]
    fn min_context_zero_accepts_all_context_windows() {
        let cap = model("a", 50, 50, 1.0, false);
        let req = requirements(Priority::Balanced);
        assert!(hard_filter(&cap, &req).is_ok());
    }

    #[test]
    fn vision_task_rejects_non_vision_model() {
        let cap = model("a", 90, 90, 1.0, false);
        let mut req = requirements(Priority::Balanced);
        req.task_type = TaskType::Vision;
        assert_eq!(
            hard_filter(&cap, &req).unwrap_err(),
            RejectReason::MissingVision
        );
    }

    #[test]
    fn cost_ceiling_rejects_expensive_model() {
        let cap = model("a", 90, 90, 50.0, false);
        let mut req = requirements(Priority::Balanced);
        req.max_cost = Some(10.0);
        assert_eq!(
            hard_filter(&cap, &req).unwrap_err(),
            RejectReason::CostExceeded
        );
    }

    #[test]
    fn quality_priority_ignores_cost() {
        let cheap = model("cheap", 80, 80, 0.0, true);
        let expensive = model("expensive", 80, 80, 100.0, false);
        let req = requirements(Priority::Quality);
        let weights = ScorerWeights::default();
        assert_eq!(
            score(&cheap, &req, &weights).unwrap(),
            score(&expensive, &req, &weights).unwrap()
        );
    }

    #[test]
    fn cost_priority_prefers_local_model() {
        let local = model("local", 70, 70, 0.0, true);
        let paid = model("paid", 70, 70, 5.0, false);
        let req = requirements(Priority::Cost);
        let weights = ScorerWeights::default();
        assert!(score(&local, &req, &weights).unwrap() > score(&paid, &req, &weights).unwrap());
    }

    #[test]
    fn scoring_is_deterministic_across_calls() {
        let cap = model("a", 85, 75, 3.0, false);
        let req = requirements(Priority::Balanced);
        let weights = ScorerWeights::default();
        let first = score(&cap, &req, &weights).unwrap();
        let second = score(&cap, &req, &weights).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn tie_break_prefers_higher_reasoning_then_context_then_insertion() {
        let a = model("a", 90, 80, 1.0, false);
        let mut b = model("b", 85, 80, 1.0, false);
        b.context_window = 256_000;
        assert!(tie_break_key(&a, 5) < tie_break_key(&b, 0));
    }
}
