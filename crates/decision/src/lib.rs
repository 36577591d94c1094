//! Experimentation and auto-optimization engine for content-generation
//! prompts
//!
//! This crate contains the decision core: the experiment manager runs
//! controlled champion/candidate comparisons and concludes them with a
//! two-proportion z-test; the variant generator proposes new candidates by
//! mutating underperforming champions according to observed performance
//! signals. The variant registry and metrics collector are external
//! collaborators reached through the traits in [`ports`].

pub mod errors;
pub mod experiment_manager;
pub mod mutations;
pub mod ports;
pub mod statistical;
pub mod store;
pub mod variant_generator;

pub use errors::{DecisionError, Result};
pub use experiment_manager::{CreateExperiment, ExperimentManager};
pub use mutations::{apply_mutation, apply_mutation_named, Transformation};
pub use ports::{MetricsCollector, VariantFilter, VariantRegistry};
pub use statistical::{analyze_experiment, ProportionZTest};
pub use store::{
    ExperimentStorage, ExperimentStore, JsonFileStorage, NullStorage, StorageError,
    StoreSnapshot,
};
pub use variant_generator::{GenerateOptions, VariantGenerator};
