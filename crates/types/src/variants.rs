//! Variant types exchanged with the external variant registry and
//! metrics collector

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::strategies::MutationStrategy;

/// Status of a variant in the registry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VariantStatus {
    /// Currently serving as the default/control for its content type
    Champion,
    /// Challenger under test against the champion
    Candidate,
    /// Serving traffic but neither champion nor candidate
    Active,
    /// No longer serving traffic
    Archived,
}

/// Lifetime performance aggregates the registry keeps per variant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariantPerformance {
    pub impressions: u64,
    pub conversions: u64,
    pub avg_latency_ms: f64,
    pub avg_quality_score: f64,
    pub error_count: u64,
    pub feedback_sum: f64,
    pub feedback_count: u64,
}

impl VariantPerformance {
    /// Errors over impressions, or 0 with no impressions
    pub fn error_rate(&self) -> f64 {
        if self.impressions > 0 {
            self.error_count as f64 / self.impressions as f64
        } else {
            0.0
        }
    }

    /// Average user feedback, if any was recorded
    pub fn avg_feedback(&self) -> Option<f64> {
        if self.feedback_count > 0 {
            Some(self.feedback_sum / self.feedback_count as f64)
        } else {
            None
        }
    }
}

/// A prompt variant, owned by the external variant registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    /// Registry identifier (opaque to this subsystem)
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Content type category this variant generates for
    pub content_type: String,
    /// The prompt text itself
    pub prompt_template: String,
    /// Registry status
    pub status: VariantStatus,
    /// Serving weight (0.0-1.0)
    pub weight: f64,
    /// Lifetime performance aggregates
    pub performance: VariantPerformance,
    /// Free-form metadata (parent id, mutation strategy, ...)
    pub metadata: HashMap<String, String>,
}

impl Variant {
    /// Mutation strategy recorded at generation time, if this variant
    /// was produced by the generator
    pub fn generation_strategy(&self) -> Option<MutationStrategy> {
        self.metadata
            .get("strategy")
            .and_then(|name| MutationStrategy::from_name(name))
    }
}

/// A generated-but-not-yet-registered variant configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantConfig {
    /// Derived identifier for the new variant
    pub id: String,
    /// Derived name
    pub name: String,
    /// Same content type as the parent
    pub content_type: String,
    /// Always `Candidate` for generated variants
    pub status: VariantStatus,
    /// Reduced starting weight
    pub weight: f64,
    /// Mutated prompt text
    pub prompt_template: String,
    /// Registry id of the variant this was mutated from
    pub parent_variant_id: String,
    /// Strategy that produced the mutation
    pub strategy: MutationStrategy,
    /// Generation timestamp
    pub generated_at: DateTime<Utc>,
}

/// Aggregate telemetry the metrics collector answers per variant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectedMetrics {
    /// Total generations observed
    pub count: u64,
    /// Average latency in milliseconds
    pub avg_latency_ms: f64,
    /// Average quality score (0.0-1.0)
    pub avg_quality: f64,
    /// Average user feedback (1-5 scale), 0 if none recorded
    pub avg_feedback: f64,
    /// Successful generations
    pub success_count: u64,
}

impl CollectedMetrics {
    /// Failures over total, or 0 with no observations.
    ///
    /// A collector reporting more successes than observations counts as
    /// zero failures rather than wrapping.
    pub fn error_rate(&self) -> f64 {
        if self.count > 0 {
            self.count.saturating_sub(self.success_count) as f64 / self.count as f64
        } else {
            0.0
        }
    }
}
