// crates/fluent-core/src/cost_ledger.rs

//! Append-only record of every provider call's token usage and cost.

use crate::types::{CostRecord, CostReport, ModelCapability, ModelCostBreakdown, Usage};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Computes the USD cost of a call against a capability's per-million-token
/// rates. `ModelCapability::input_cost`/`output_cost` are already
/// per-million, matching the registry's documented units.
pub fn calculate_cost(capability: &ModelCapability, usage: Usage) -> f64 {
    let prompt_cost = usage.input_tokens as f64 / 1_000_000.0 * capability.input_cost;
    let completion_cost = usage.output_tokens as f64 / 1_000_000.0 * capability.output_cost;
    prompt_cost + completion_cost
}

/// The process-lifetime sequence of Cost Records. Appends are serialized
/// through a single mutex; readers take a snapshot (a clone of the
/// current vector) rather than holding the lock while building a report.
pub struct CostLedger {
    records: Arc<Mutex<Vec<CostRecord>>>,
}

impl Default for CostLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl CostLedger {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Appends one record for a completed or failed provider call. `note`
    /// carries context like `"cancelled"` for zero-token aborted attempts.
    pub async fn record(
        &self,
        model_id: &str,
        usage: Usage,
        cost_usd: f64,
        request_id: &str,
        note: Option<String>,
    ) {
        let record = CostRecord {
            model_id: model_id.to_string(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cost_usd,
            timestamp: Utc::now().to_rfc3339(),
            request_id: request_id.to_string(),
            note,
        };
        self.records.lock().await.push(record);
    }

    /// Convenience wrapper generating a fresh request id, for callers
    /// that don't already have one in scope (e.g. standalone tests).
    pub async fn record_new_request(&self, model_id: &str, usage: Usage, cost_usd: f64) {
        self.record(model_id, usage, cost_usd, &Uuid::new_v4().to_string(), None)
            .await;
    }

    /// Snapshot of every record appended so far, in append order.
    pub async fn snapshot(&self) -> Vec<CostRecord> {
        self.records.lock().await.clone()
    }

    /// Aggregates the current snapshot into a per-model cost report.
    pub async fn report(&self) -> CostReport {
        let records = self.snapshot().await;
        let mut report = CostReport::default();
        for record in &records {
            report.total_input_tokens += record.input_tokens as u64;
            report.total_output_tokens += record.output_tokens as u64;
            report.total_cost_usd += record.cost_usd;

            let entry = report
                .per_model
                .entry(record.model_id.clone())
                .or_insert_with(ModelCostBreakdown::default);
            entry.input_tokens += record.input_tokens as u64;
            entry.output_tokens += record.output_tokens as u64;
            entry.cost_usd += record.cost_usd;
            entry.requests += 1;
        }
        report
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}
