//! Token and cost accounting per model role.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ModelRole;
use crate::providers::TokenUsage;

/// Accumulated LLM usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,

    /// Number of LLM calls made
    pub llm_calls: u32,

    /// Estimated cost in USD
    pub estimated_cost: f64,

    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

impl LlmUsage {
    /// Add token usage from a provider response.
    pub fn add(&mut self, usage: &TokenUsage, model: &str) {
        self.prompt_tokens += u64::from(usage.prompt_tokens);
        self.completion_tokens += u64::from(usage.completion_tokens);
        self.total_tokens += u64::from(usage.total());
        self.llm_calls += 1;
        self.cache_creation_tokens += u64::from(usage.cache_creation_tokens);
        self.cache_read_tokens += u64::from(usage.cache_read_tokens);
        self.estimated_cost += estimate_cost(usage, model);
    }

    pub fn merge(&mut self, other: &LlmUsage) {
        self.total_tokens += other.total_tokens;
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.llm_calls += other.llm_calls;
        self.estimated_cost += other.estimated_cost;
        self.cache_creation_tokens += other.cache_creation_tokens;
        self.cache_read_tokens += other.cache_read_tokens;
    }
}

/// Estimated USD cost of one response.
pub fn estimate_cost(usage: &TokenUsage, model: &str) -> f64 {
    // USD per million tokens: input, output, cache write, cache read
    let (input_rate, output_rate, cache_write_rate, cache_read_rate) = match model {
        m if m.contains("opus") => (15.0, 75.0, 18.75, 1.5),
        m if m.contains("haiku") => (0.8, 4.0, 1.0, 0.08),
        _ => (3.0, 15.0, 3.75, 0.3),
    };

    let per_million = |tokens: u32, rate: f64| (tokens as f64 / 1_000_000.0) * rate;

    per_million(usage.prompt_tokens, input_rate)
        + per_million(usage.completion_tokens, output_rate)
        + per_million(usage.cache_creation_tokens, cache_write_rate)
        + per_million(usage.cache_read_tokens, cache_read_rate)
}

/// Usage per [`ModelRole`], shared by every client of a runtime.
#[derive(Debug, Default)]
pub struct UsageTracker {
    by_role: RwLock<BTreeMap<ModelRole, LlmUsage>>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, role: ModelRole, usage: &TokenUsage, model: &str) {
        self.by_role
            .write()
            .entry(role)
            .or_default()
            .add(usage, model);
    }

    pub fn for_role(&self, role: ModelRole) -> LlmUsage {
        self.by_role.read().get(&role).cloned().unwrap_or_default()
    }

    pub fn total(&self) -> LlmUsage {
        let mut total = LlmUsage::default();
        for usage in self.by_role.read().values() {
            total.merge(usage);
        }
        total
    }

    pub fn snapshot(&self) -> BTreeMap<ModelRole, LlmUsage> {
        self.by_role.read().clone()
    }

    pub fn reset(&self) {
        self.by_role.write().clear();
    }

    /// Usage as `(metric name, value)` pairs for the tracker, e.g.
    /// `judge_total_tokens`, `total_estimated_cost`.
    pub fn metrics(&self) -> Vec<(String, f64)> {
        let mut metrics = Vec::new();
        for (role, usage) in self.snapshot() {
            metrics.push((format!("{}_total_tokens", role), usage.total_tokens as f64));
            metrics.push((format!("{}_llm_calls", role), f64::from(usage.llm_calls)));
        }
        let total = self.total();
        metrics.push(("total_prompt_tokens".to_string(), total.prompt_tokens as f64));
        metrics.push((
            "total_completion_tokens".to_string(),
            total.completion_tokens as f64,
        ));
        metrics.push(("total_estimated_cost".to_string(), total.estimated_cost));
        metrics
    }
}
