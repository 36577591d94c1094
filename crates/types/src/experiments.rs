//! Experiment and per-arm metric types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of an experiment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    Draft,
    Running,
    Paused,
    Concluded,
    Promoted,
}

/// The two arms of an experiment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Arm {
    Control,
    Treatment,
}

/// Why an experiment was concluded
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConclusionReason {
    /// Significance, sample size, and effect size all reached before the
    /// duration cap, at the stricter early-stop confidence bar
    EarlySignificance,
    /// Maximum run length elapsed
    MaxDuration,
    /// Explicitly concluded by a caller
    Manual,
}

/// Action recommended by the conclusion snapshot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    PromoteTreatment,
    KeepControl,
    NoChange,
}

/// Traffic split between the two arms (metadata only, not enforced here)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TrafficSplit {
    pub control: f64,
    pub treatment: f64,
}

impl TrafficSplit {
    /// Create a split, clamping each weight to [0, 1]
    pub fn new(control: f64, treatment: f64) -> Self {
        Self {
            control: control.clamp(0.0, 1.0),
            treatment: treatment.clamp(0.0, 1.0),
        }
    }

    /// Whether the weights sum to 1.0 within tolerance
    pub fn is_valid(&self) -> bool {
        (self.control + self.treatment - 1.0).abs() <= 0.01
    }
}

impl Default for TrafficSplit {
    fn default() -> Self {
        Self {
            control: 0.5,
            treatment: 0.5,
        }
    }
}

/// A single observed generation outcome, reported once per serving
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MetricSample {
    /// Whether the generation succeeded
    pub success: bool,
    /// Latency of the generation in milliseconds
    pub latency_ms: Option<f64>,
    /// Quality score (0.0-1.0)
    pub quality_score: Option<f64>,
    /// User feedback value (1-5 scale)
    pub feedback: Option<f64>,
}

/// Monotonically-growing counters for one experiment arm
///
/// Latency and quality are only accumulated on success; feedback is counted
/// independently of success or failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ArmMetrics {
    /// Times this arm was selected
    pub impressions: u64,
    /// Successful generations
    pub successes: u64,
    /// Failed generations
    pub failures: u64,
    /// Sum of latencies over successful generations (ms)
    pub total_latency_ms: f64,
    /// Sum of quality scores over successful generations
    pub total_quality: f64,
    /// Sum of user feedback values
    pub total_feedback: f64,
    /// Number of feedback values recorded
    pub feedback_count: u64,
}

impl ArmMetrics {
    /// Accumulate one observed outcome
    pub fn record(&mut self, sample: &MetricSample) {
        self.impressions += 1;
        if sample.success {
            self.successes += 1;
            if let Some(latency) = sample.latency_ms {
                self.total_latency_ms += latency;
            }
            if let Some(quality) = sample.quality_score {
                self.total_quality += quality;
            }
        } else {
            self.failures += 1;
        }
        if let Some(feedback) = sample.feedback {
            self.total_feedback += feedback;
            self.feedback_count += 1;
        }
    }

    /// successes / impressions, or 0 with no impressions
    pub fn conversion_rate(&self) -> f64 {
        if self.impressions > 0 {
            self.successes as f64 / self.impressions as f64
        } else {
            0.0
        }
    }

    /// Average latency over successful generations
    pub fn avg_latency_ms(&self) -> f64 {
        if self.successes > 0 {
            self.total_latency_ms / self.successes as f64
        } else {
            0.0
        }
    }

    /// Average quality over successful generations
    pub fn avg_quality(&self) -> f64 {
        if self.successes > 0 {
            self.total_quality / self.successes as f64
        } else {
            0.0
        }
    }

    /// Average user feedback
    pub fn avg_feedback(&self) -> f64 {
        if self.feedback_count > 0 {
            self.total_feedback / self.feedback_count as f64
        } else {
            0.0
        }
    }

    /// Zero all counters
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Result of the composite statistical analysis over both arms
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentAnalysis {
    /// Control conversion rate
    pub control_rate: f64,
    /// Treatment conversion rate
    pub treatment_rate: f64,
    /// 95% Wald interval for the control rate, clamped to [0, 1]
    pub control_interval: (f64, f64),
    /// 95% Wald interval for the treatment rate, clamped to [0, 1]
    pub treatment_interval: (f64, f64),
    /// Pooled two-proportion z-score (treatment minus control)
    pub z_score: f64,
    /// Two-tailed p-value
    pub p_value: f64,
    /// 1 - p_value
    pub confidence: f64,
    /// (treatment_rate - control_rate) / control_rate
    pub relative_improvement: f64,
    /// Treatment minus control average quality (informational)
    pub quality_delta: f64,
    /// Treatment minus control average latency in ms (informational)
    pub latency_delta_ms: f64,
    /// Both arms reached the minimum sample size
    pub has_sufficient_samples: bool,
    /// p_value below the significance level
    pub is_significant: bool,
    /// Absolute relative improvement reached the minimum effect size
    pub has_minimum_effect: bool,
    /// The winning arm, if every gate passed
    pub winner: Option<Arm>,
    /// Names the first failed gate when there is no winner
    pub reason: String,
}

/// Decision snapshot stored on a concluded experiment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentConclusion {
    /// Why the experiment was concluded
    pub reason: ConclusionReason,
    /// Full analysis at conclusion time
    pub analysis: ExperimentAnalysis,
    /// Winning arm, if any
    pub winner: Option<Arm>,
    /// Registry id of the winning variant, if any
    pub winning_variant_id: Option<String>,
    /// What the caller should do with the result
    pub recommended_action: RecommendedAction,
    /// Set when the treatment was promoted to champion
    pub promoted_at: Option<DateTime<Utc>>,
}

/// A controlled comparison between a champion (control) and a candidate
/// (treatment) prompt variant for one content type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    /// Unique experiment identifier
    pub id: Uuid,
    /// Human-readable name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Hypothesis under test, if stated
    pub hypothesis: Option<String>,
    /// Content type both variants belong to
    pub content_type: String,
    /// Registry id of the control (champion) variant
    pub control_variant_id: String,
    /// Registry id of the treatment (candidate) variant
    pub treatment_variant_id: String,
    /// Metric the experiment optimizes for
    pub success_metric: String,
    /// Advisory traffic split between the arms
    pub traffic_split: TrafficSplit,
    /// Current lifecycle status
    pub status: ExperimentStatus,
    /// Accumulated control-arm counters
    pub control_metrics: ArmMetrics,
    /// Accumulated treatment-arm counters
    pub treatment_metrics: ArmMetrics,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// First start time
    pub started_at: Option<DateTime<Utc>>,
    /// Conclusion time
    pub concluded_at: Option<DateTime<Utc>>,
    /// Decision snapshot, set once concluded
    pub conclusion: Option<ExperimentConclusion>,
}

impl Experiment {
    /// Create a new experiment in `Draft`
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        control_variant_id: impl Into<String>,
        treatment_variant_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            hypothesis: None,
            content_type: content_type.into(),
            control_variant_id: control_variant_id.into(),
            treatment_variant_id: treatment_variant_id.into(),
            success_metric: "conversion".to_string(),
            traffic_split: TrafficSplit::default(),
            status: ExperimentStatus::Draft,
            control_metrics: ArmMetrics::default(),
            treatment_metrics: ArmMetrics::default(),
            created_at: Utc::now(),
            started_at: None,
            concluded_at: None,
            conclusion: None,
        }
    }

    /// Which arm a variant id belongs to, if either
    pub fn arm_of(&self, variant_id: &str) -> Option<Arm> {
        if self.control_variant_id == variant_id {
            Some(Arm::Control)
        } else if self.treatment_variant_id == variant_id {
            Some(Arm::Treatment)
        } else {
            None
        }
    }

    /// Metrics accumulator for an arm
    pub fn metrics(&self, arm: Arm) -> &ArmMetrics {
        match arm {
            Arm::Control => &self.control_metrics,
            Arm::Treatment => &self.treatment_metrics,
        }
    }

    /// Mutable metrics accumulator for an arm
    pub fn metrics_mut(&mut self, arm: Arm) -> &mut ArmMetrics {
        match arm {
            Arm::Control => &mut self.control_metrics,
            Arm::Treatment => &mut self.treatment_metrics,
        }
    }

    /// Variant id serving an arm
    pub fn variant_id(&self, arm: Arm) -> &str {
        match arm {
            Arm::Control => &self.control_variant_id,
            Arm::Treatment => &self.treatment_variant_id,
        }
    }

    /// Seconds since the experiment first started, if it has
    pub fn running_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        self.started_at.map(|started| (now - started).num_seconds())
    }
}
