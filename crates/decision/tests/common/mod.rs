//! Shared in-memory test doubles for the external collaborators

#![allow(dead_code)]

use async_trait::async_trait;
use prompt_optimizer_decision::{
    DecisionError, MetricsCollector, Result, VariantFilter, VariantRegistry,
};
use prompt_optimizer_types::variants::{
    CollectedMetrics, Variant, VariantConfig, VariantPerformance, VariantStatus,
};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Route engine logs through the test harness; safe to call repeatedly
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// In-memory variant registry
#[derive(Default)]
pub struct InMemoryRegistry {
    variants: Mutex<HashMap<String, Variant>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variant(&self, id: &str, content_type: &str, status: VariantStatus, prompt: &str) {
        self.variants.lock().unwrap().insert(
            id.to_string(),
            Variant {
                id: id.to_string(),
                name: id.to_string(),
                content_type: content_type.to_string(),
                prompt_template: prompt.to_string(),
                status,
                weight: if status == VariantStatus::Champion { 1.0 } else { 0.3 },
                performance: VariantPerformance::default(),
                metadata: HashMap::new(),
            },
        );
    }

    pub fn status_of(&self, id: &str) -> Option<VariantStatus> {
        self.variants.lock().unwrap().get(id).map(|v| v.status)
    }

    pub fn live_count(&self, content_type: &str) -> usize {
        self.variants
            .lock()
            .unwrap()
            .values()
            .filter(|v| v.content_type == content_type && v.status != VariantStatus::Archived)
            .count()
    }
}

#[async_trait]
impl VariantRegistry for InMemoryRegistry {
    async fn get(&self, variant_id: &str) -> Result<Option<Variant>> {
        Ok(self.variants.lock().unwrap().get(variant_id).cloned())
    }

    async fn get_by_content_type(
        &self,
        content_type: &str,
        filter: VariantFilter,
    ) -> Result<Vec<Variant>> {
        Ok(self
            .variants
            .lock()
            .unwrap()
            .values()
            .filter(|v| v.content_type == content_type)
            .filter(|v| match filter {
                VariantFilter::All => true,
                VariantFilter::Live => v.status != VariantStatus::Archived,
            })
            .cloned()
            .collect())
    }

    async fn get_champion(&self, content_type: &str) -> Result<Option<Variant>> {
        Ok(self
            .variants
            .lock()
            .unwrap()
            .values()
            .find(|v| v.content_type == content_type && v.status == VariantStatus::Champion)
            .cloned())
    }

    async fn set_as_candidate(&self, variant_id: &str) -> Result<()> {
        let mut variants = self.variants.lock().unwrap();
        let variant = variants
            .get_mut(variant_id)
            .ok_or_else(|| DecisionError::VariantNotFound(variant_id.to_string()))?;
        variant.status = VariantStatus::Candidate;
        Ok(())
    }

    async fn promote_to_champion(&self, variant_id: &str) -> Result<bool> {
        let mut variants = self.variants.lock().unwrap();
        let content_type = match variants.get(variant_id) {
            Some(v) => v.content_type.clone(),
            None => return Ok(false),
        };
        for variant in variants.values_mut() {
            if variant.content_type == content_type && variant.status == VariantStatus::Champion {
                variant.status = VariantStatus::Archived;
            }
        }
        if let Some(variant) = variants.get_mut(variant_id) {
            variant.status = VariantStatus::Champion;
            variant.weight = 1.0;
        }
        Ok(true)
    }

    async fn register(&self, config: VariantConfig) -> Result<Variant> {
        let mut metadata = HashMap::new();
        metadata.insert("parent".to_string(), config.parent_variant_id.clone());
        metadata.insert("strategy".to_string(), config.strategy.to_string());

        let variant = Variant {
            id: config.id.clone(),
            name: config.name,
            content_type: config.content_type,
            prompt_template: config.prompt_template,
            status: config.status,
            weight: config.weight,
            performance: VariantPerformance::default(),
            metadata,
        };
        self.variants
            .lock()
            .unwrap()
            .insert(config.id, variant.clone());
        Ok(variant)
    }
}

/// Metrics collector answering from a fixed per-variant table
#[derive(Default)]
pub struct FixedCollector {
    metrics: Mutex<HashMap<String, CollectedMetrics>>,
}

impl FixedCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_metrics(&self, variant_id: &str, metrics: CollectedMetrics) {
        self.metrics
            .lock()
            .unwrap()
            .insert(variant_id.to_string(), metrics);
    }
}

#[async_trait]
impl MetricsCollector for FixedCollector {
    async fn variant_metrics(&self, variant_id: &str) -> Result<CollectedMetrics> {
        Ok(self
            .metrics
            .lock()
            .unwrap()
            .get(variant_id)
            .cloned()
            .unwrap_or_default())
    }
}
