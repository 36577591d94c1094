//! Performance-driven variant generation
//!
//! The generator turns observed performance signals into improvement
//! suggestions, mutates a parent prompt with the chosen strategy, and
//! keeps a capacity-bounded history of what it generated and why.

use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    errors::{DecisionError, Result},
    mutations::apply_mutation,
    ports::{MetricsCollector, VariantFilter, VariantRegistry},
};
use prompt_optimizer_types::{
    strategies::{GenerationRecord, GeneratorSettings, MutationStrategy, PerformanceSnapshot, Suggestion},
    variants::{CollectedMetrics, Variant, VariantConfig, VariantStatus},
};

/// Options for a single generation
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Force a specific strategy instead of deriving one from performance
    pub strategy: Option<MutationStrategy>,
    /// Override the derived name
    pub name: Option<String>,
    /// Reason recorded in the generation history
    pub reason: Option<String>,
}

/// Mutation-strategy engine that proposes new candidate variants
pub struct VariantGenerator {
    registry: Arc<dyn VariantRegistry>,
    collector: Arc<dyn MetricsCollector>,
    settings: GeneratorSettings,
    history: RwLock<VecDeque<GenerationRecord>>,
}

impl VariantGenerator {
    pub fn new(
        registry: Arc<dyn VariantRegistry>,
        collector: Arc<dyn MetricsCollector>,
        settings: GeneratorSettings,
    ) -> Self {
        Self {
            registry,
            collector,
            settings,
            history: RwLock::new(VecDeque::new()),
        }
    }

    /// Map observed performance to a ranked list of improvement
    /// suggestions, most urgent (priority 1) first.
    ///
    /// A snapshot with no impressions yields no suggestions.
    pub fn suggest_improvements(snapshot: &PerformanceSnapshot) -> Vec<Suggestion> {
        if snapshot.impressions == 0 {
            return Vec::new();
        }

        let mut suggestions = Vec::new();

        if snapshot.error_rate > 0.10 {
            suggestions.push(Suggestion {
                strategy: MutationStrategy::Structured,
                reason: format!(
                    "error rate {:.1}% exceeds 10%",
                    snapshot.error_rate * 100.0
                ),
                priority: 1,
            });
        }
        if snapshot.avg_quality < 0.70 {
            suggestions.push(Suggestion {
                strategy: MutationStrategy::Detailed,
                reason: format!("average quality {:.2} is below 0.70", snapshot.avg_quality),
                priority: 2,
            });
        }
        if snapshot.avg_latency_ms > 5000.0 {
            suggestions.push(Suggestion {
                strategy: MutationStrategy::Concise,
                reason: format!(
                    "average latency {:.0}ms exceeds 5000ms",
                    snapshot.avg_latency_ms
                ),
                priority: 3,
            });
        }
        if let Some(feedback) = snapshot.avg_feedback {
            if feedback < 3.0 {
                suggestions.push(Suggestion {
                    strategy: MutationStrategy::Instructive,
                    reason: format!("average feedback {feedback:.1} is below 3 of 5"),
                    priority: 2,
                });
            }
        }

        // stable sort keeps rule order within a priority tier
        suggestions.sort_by_key(|s| s.priority);
        suggestions
    }

    /// Generate a new candidate configuration by mutating a parent variant.
    ///
    /// Strategy precedence: explicit option, then the top suggestion from
    /// the parent's live telemetry, then `concise` as the fallback. The
    /// configuration is not persisted; see `generate_and_register`.
    pub async fn generate_variant(
        &self,
        parent_variant_id: &str,
        options: GenerateOptions,
    ) -> Result<VariantConfig> {
        let parent = self
            .registry
            .get(parent_variant_id)
            .await?
            .ok_or_else(|| DecisionError::VariantNotFound(parent_variant_id.to_string()))?;

        let (strategy, derived_reason) = match options.strategy {
            Some(strategy) => (strategy, "explicitly requested".to_string()),
            None => {
                let collected = self.collector.variant_metrics(parent_variant_id).await?;
                match Self::suggest_improvements(&snapshot_from(&collected)).into_iter().next() {
                    Some(top) => (top.strategy, top.reason),
                    None => (MutationStrategy::Concise, "default strategy".to_string()),
                }
            }
        };

        let id = format!("{}-{}", parent.id, &Uuid::new_v4().simple().to_string()[..8]);
        let config = VariantConfig {
            id: id.clone(),
            name: options
                .name
                .unwrap_or_else(|| format!("{} ({})", parent.name, strategy)),
            content_type: parent.content_type.clone(),
            status: VariantStatus::Candidate,
            weight: self.settings.candidate_weight,
            prompt_template: apply_mutation(&parent.prompt_template, strategy),
            parent_variant_id: parent.id.clone(),
            strategy,
            generated_at: Utc::now(),
        };

        debug!(
            parent_variant_id,
            new_variant_id = %id,
            %strategy,
            "generated variant configuration"
        );

        self.push_history(GenerationRecord {
            timestamp: config.generated_at,
            parent_variant_id: parent.id,
            new_variant_id: id,
            strategy,
            reason: options.reason.unwrap_or(derived_reason),
        })
        .await;

        Ok(config)
    }

    /// Generate a candidate and hand it to the registry for persistence
    pub async fn generate_and_register(
        &self,
        parent_variant_id: &str,
        options: GenerateOptions,
    ) -> Result<Variant> {
        let config = self.generate_variant(parent_variant_id, options).await?;
        let variant = self.registry.register(config).await?;
        info!(variant_id = %variant.id, content_type = %variant.content_type, "registered generated variant");
        Ok(variant)
    }

    /// Judge a content type's champion and generate candidates for its
    /// top-priority weaknesses.
    ///
    /// Returns nothing when the content type has no champion, the champion
    /// has too few impressions to judge, no suggestion fires, or the live
    /// variant cap leaves no free slots. Suggestions whose strategy is
    /// already represented among live variants are skipped. The returned
    /// configurations are not registered; the caller decides.
    pub async fn analyze_and_generate(&self, content_type: &str) -> Result<Vec<VariantConfig>> {
        let Some(champion) = self.registry.get_champion(content_type).await? else {
            debug!(content_type, "no champion to analyze");
            return Ok(Vec::new());
        };

        let collected = self.collector.variant_metrics(&champion.id).await?;
        if collected.count < self.settings.min_impressions {
            debug!(
                content_type,
                impressions = collected.count,
                "champion has insufficient data to judge"
            );
            return Ok(Vec::new());
        }

        let suggestions = Self::suggest_improvements(&snapshot_from(&collected));
        if suggestions.is_empty() {
            return Ok(Vec::new());
        }

        let live = self
            .registry
            .get_by_content_type(content_type, VariantFilter::Live)
            .await?;
        let slots = self
            .settings
            .max_variants_per_type
            .saturating_sub(live.len());
        if slots == 0 {
            info!(content_type, "variant cap reached, skipping generation");
            return Ok(Vec::new());
        }

        let existing_strategies: Vec<MutationStrategy> = live
            .iter()
            .filter_map(|v| v.generation_strategy())
            .collect();

        let mut generated = Vec::new();
        for suggestion in suggestions {
            if generated.len() >= slots {
                break;
            }
            if existing_strategies.contains(&suggestion.strategy) {
                debug!(
                    content_type,
                    strategy = %suggestion.strategy,
                    "strategy already represented, skipping"
                );
                continue;
            }
            let config = self
                .generate_variant(
                    &champion.id,
                    GenerateOptions {
                        strategy: Some(suggestion.strategy),
                        reason: Some(suggestion.reason),
                        ..Default::default()
                    },
                )
                .await?;
            generated.push(config);
        }

        info!(
            content_type,
            generated = generated.len(),
            "analyzed champion and generated candidates"
        );
        Ok(generated)
    }

    /// Generation history, oldest first
    pub async fn history(&self) -> Vec<GenerationRecord> {
        self.history.read().await.iter().cloned().collect()
    }

    async fn push_history(&self, record: GenerationRecord) {
        let mut history = self.history.write().await;
        history.push_back(record);
        while history.len() > self.settings.history_capacity {
            history.pop_front();
        }
    }
}

/// Flatten collector telemetry into the rule input
fn snapshot_from(collected: &CollectedMetrics) -> PerformanceSnapshot {
    PerformanceSnapshot {
        impressions: collected.count,
        error_rate: collected.error_rate(),
        avg_quality: collected.avg_quality,
        avg_latency_ms: collected.avg_latency_ms,
        avg_feedback: (collected.avg_feedback > 0.0).then_some(collected.avg_feedback),
    }
}
