//! Interfaces to the external collaborators
//!
//! The variant registry owns variant CRUD, champion designation, and
//! lifetime performance aggregates; the metrics collector owns
//! per-generation telemetry. This subsystem only talks to them through
//! these two traits.

use async_trait::async_trait;

use crate::errors::Result;
use prompt_optimizer_types::variants::{CollectedMetrics, Variant, VariantConfig};

/// Which variants a registry query should return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantFilter {
    /// Every variant for the content type
    All,
    /// Only variants currently serving traffic (champion, candidates,
    /// and active variants)
    Live,
}

/// Read/write access to the external variant registry
#[async_trait]
pub trait VariantRegistry: Send + Sync {
    /// Look up a variant by id
    async fn get(&self, variant_id: &str) -> Result<Option<Variant>>;

    /// Variants for a content type, per the filter
    async fn get_by_content_type(
        &self,
        content_type: &str,
        filter: VariantFilter,
    ) -> Result<Vec<Variant>>;

    /// The current champion for a content type, if one is designated
    async fn get_champion(&self, content_type: &str) -> Result<Option<Variant>>;

    /// Mark a variant as a candidate under test
    async fn set_as_candidate(&self, variant_id: &str) -> Result<()>;

    /// Swap a variant in as the champion for its content type;
    /// returns whether the registry performed the swap
    async fn promote_to_champion(&self, variant_id: &str) -> Result<bool>;

    /// Persist a generated variant configuration
    async fn register(&self, config: VariantConfig) -> Result<Variant>;
}

/// Read access to the external metrics collector
#[async_trait]
pub trait MetricsCollector: Send + Sync {
    /// Aggregate telemetry for one variant
    async fn variant_metrics(&self, variant_id: &str) -> Result<CollectedMetrics>;
}
