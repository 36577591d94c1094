//! Mutation strategies and tuning settings for the experimentation engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Named, deterministic text-transformation recipe applied to a prompt
/// template to produce a new candidate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MutationStrategy {
    /// Strip boilerplate and politeness, shorten the prompt
    Concise,
    /// Ask for thorough, well-developed output
    Detailed,
    /// Impose explicit sections and formatting
    Structured,
    /// Turn the prompt into step-by-step instructions
    Instructive,
    /// Anchor the prompt with a worked example
    ExampleBased,
    /// Spell out hard constraints on the output
    ConstraintFocused,
    /// Emphasize the shape of the expected output
    OutputFocused,
    /// Combination of concise phrasing and structured output
    Hybrid,
}

impl MutationStrategy {
    /// All known strategies, in declaration order
    pub const ALL: [MutationStrategy; 8] = [
        MutationStrategy::Concise,
        MutationStrategy::Detailed,
        MutationStrategy::Structured,
        MutationStrategy::Instructive,
        MutationStrategy::ExampleBased,
        MutationStrategy::ConstraintFocused,
        MutationStrategy::OutputFocused,
        MutationStrategy::Hybrid,
    ];

    /// Canonical snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationStrategy::Concise => "concise",
            MutationStrategy::Detailed => "detailed",
            MutationStrategy::Structured => "structured",
            MutationStrategy::Instructive => "instructive",
            MutationStrategy::ExampleBased => "example_based",
            MutationStrategy::ConstraintFocused => "constraint_focused",
            MutationStrategy::OutputFocused => "output_focused",
            MutationStrategy::Hybrid => "hybrid",
        }
    }

    /// Parse a canonical name; `None` for unknown strategies
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_str() == name)
    }
}

impl std::fmt::Display for MutationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ranked improvement suggestion derived from observed performance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suggestion {
    /// Strategy to try
    pub strategy: MutationStrategy,
    /// Which signal triggered the suggestion
    pub reason: String,
    /// 1 is most urgent
    pub priority: u8,
}

/// Flattened performance view the suggestion rules run over
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    /// Total generations observed
    pub impressions: u64,
    /// Failures over total (0.0-1.0)
    pub error_rate: f64,
    /// Average quality score (0.0-1.0)
    pub avg_quality: f64,
    /// Average latency in milliseconds
    pub avg_latency_ms: f64,
    /// Average user feedback (1-5 scale), if any was recorded
    pub avg_feedback: Option<f64>,
}

/// Append-only, capacity-bounded log entry for one generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub timestamp: DateTime<Utc>,
    pub parent_variant_id: String,
    pub new_variant_id: String,
    pub strategy: MutationStrategy,
    pub reason: String,
}

/// Statistical decision thresholds for the experiment manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentSettings {
    /// Minimum impressions per arm before a winner can be declared
    pub min_sample_size: u64,
    /// Standard significance level (p-value threshold)
    pub significance_level: f64,
    /// Minimum absolute relative improvement to declare a winner
    pub min_effect_size: f64,
    /// Confidence required to conclude before the duration cap; stricter
    /// than the standard threshold to avoid stopping on noise
    pub early_stop_confidence: f64,
    /// Maximum experiment run length in seconds
    pub max_duration_seconds: u64,
    /// Promote the treatment automatically when it wins
    pub auto_promote: bool,
}

impl Default for ExperimentSettings {
    fn default() -> Self {
        Self {
            min_sample_size: 30,
            significance_level: 0.05,
            min_effect_size: 0.05,
            early_stop_confidence: 0.99,
            max_duration_seconds: 14 * 24 * 3600, // 14 days
            auto_promote: true,
        }
    }
}

/// Tuning knobs for the variant generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorSettings {
    /// Minimum champion impressions before its performance is judged
    pub min_impressions: u64,
    /// Cap on live variants per content type
    pub max_variants_per_type: usize,
    /// Starting weight for generated candidates
    pub candidate_weight: f64,
    /// Generation history entries kept before oldest are evicted
    pub history_capacity: usize,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            min_impressions: 50,
            max_variants_per_type: 5,
            candidate_weight: 0.3,
            history_capacity: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_name_round_trip() {
        for strategy in MutationStrategy::ALL {
            assert_eq!(MutationStrategy::from_name(strategy.as_str()), Some(strategy));
        }
        assert_eq!(MutationStrategy::from_name("not_a_strategy"), None);
    }

    #[test]
    fn test_default_experiment_settings() {
        let settings = ExperimentSettings::default();
        assert_eq!(settings.min_sample_size, 30);
        assert_eq!(settings.significance_level, 0.05);
        assert_eq!(settings.early_stop_confidence, 0.99);
        assert_eq!(settings.max_duration_seconds, 1_209_600);
    }

    #[test]
    fn test_default_generator_settings() {
        let settings = GeneratorSettings::default();
        assert_eq!(settings.min_impressions, 50);
        assert_eq!(settings.max_variants_per_type, 5);
        assert_eq!(settings.candidate_weight, 0.3);
    }
}
