//! Experiment lifecycle management
//!
//! This module manages the full lifecycle of champion/candidate experiments:
//! creation, start/pause, per-generation metric recording, statistical
//! conclusion, and champion promotion. All store mutations go through one
//! write lock so the three store indices and the one-running-experiment-
//! per-content-type invariant stay consistent.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    errors::{DecisionError, Result},
    ports::VariantRegistry,
    statistical::analyze_experiment,
    store::{ExperimentStorage, ExperimentStore},
};
use prompt_optimizer_types::{
    experiments::{
        Arm, Experiment, ExperimentAnalysis, ExperimentConclusion, ExperimentStatus,
        ConclusionReason, MetricSample, RecommendedAction, TrafficSplit,
    },
    strategies::ExperimentSettings,
};

/// Parameters for creating a new experiment
#[derive(Debug, Clone, Default)]
pub struct CreateExperiment {
    /// Registry id of the champion serving as control
    pub control_variant_id: String,
    /// Registry id of the candidate serving as treatment
    pub treatment_variant_id: String,
    /// Optional human-readable name
    pub name: Option<String>,
    /// Optional description
    pub description: Option<String>,
    /// Optional hypothesis under test
    pub hypothesis: Option<String>,
    /// Optional traffic split (defaults to 50/50)
    pub traffic_split: Option<TrafficSplit>,
    /// Optional success metric name (defaults to "conversion")
    pub success_metric: Option<String>,
}

/// Experiment lifecycle manager and statistical decision engine
pub struct ExperimentManager {
    store: RwLock<ExperimentStore>,
    storage: Arc<dyn ExperimentStorage>,
    registry: Arc<dyn VariantRegistry>,
    settings: ExperimentSettings,
}

impl ExperimentManager {
    /// Create a manager with an empty store
    pub fn new(
        registry: Arc<dyn VariantRegistry>,
        storage: Arc<dyn ExperimentStorage>,
        settings: ExperimentSettings,
    ) -> Self {
        Self {
            store: RwLock::new(ExperimentStore::new()),
            storage,
            registry,
            settings,
        }
    }

    /// Restore the store from persisted state.
    ///
    /// A failed load is logged and leaves the store empty (cold start);
    /// running experiments found in the snapshot are re-registered as
    /// active for their content type.
    pub async fn restore(&self) {
        match self.storage.load().await {
            Ok(Some(snapshot)) => {
                let mut store = self.store.write().await;
                let count = snapshot.experiments.len();
                store.restore(snapshot);
                info!(experiments = count, "restored experiment store");
            }
            Ok(None) => debug!("no persisted experiment store, starting cold"),
            Err(e) => warn!(error = %e, "failed to load experiment store, starting cold"),
        }
    }

    /// Create a new experiment in `Draft`.
    ///
    /// Both variants must exist in the registry and share a content type.
    pub async fn create_experiment(&self, params: CreateExperiment) -> Result<Uuid> {
        let control = self
            .registry
            .get(&params.control_variant_id)
            .await?
            .ok_or_else(|| DecisionError::VariantNotFound(params.control_variant_id.clone()))?;
        let treatment = self
            .registry
            .get(&params.treatment_variant_id)
            .await?
            .ok_or_else(|| DecisionError::VariantNotFound(params.treatment_variant_id.clone()))?;

        if control.content_type != treatment.content_type {
            return Err(DecisionError::InvalidArgument(format!(
                "variants belong to different content types: {} vs {}",
                control.content_type, treatment.content_type
            )));
        }

        let traffic_split = params.traffic_split.unwrap_or_default();
        if !traffic_split.is_valid() {
            return Err(DecisionError::InvalidArgument(format!(
                "traffic split must sum to 1.0, got {} + {}",
                traffic_split.control, traffic_split.treatment
            )));
        }

        let mut experiment = Experiment::new(
            params
                .name
                .unwrap_or_else(|| format!("{} vs {}", control.name, treatment.name)),
            control.content_type.clone(),
            params.control_variant_id,
            params.treatment_variant_id,
        );
        experiment.description = params.description.unwrap_or_default();
        experiment.hypothesis = params.hypothesis;
        experiment.traffic_split = traffic_split;
        if let Some(metric) = params.success_metric {
            experiment.success_metric = metric;
        }

        let id = experiment.id;
        info!(
            experiment_id = %id,
            content_type = %experiment.content_type,
            "created experiment"
        );

        self.store.write().await.insert(experiment);
        self.persist().await;

        Ok(id)
    }

    /// Start (or resume) an experiment.
    ///
    /// Legal only from `Draft` or `Paused`, and only while no other
    /// experiment is running for the same content type. Marks the
    /// treatment variant as a candidate in the registry.
    pub async fn start_experiment(&self, id: &Uuid) -> Result<()> {
        let mut store = self.store.write().await;

        let experiment = store
            .get(id)
            .ok_or_else(|| DecisionError::ExperimentNotFound(id.to_string()))?;

        if !matches!(
            experiment.status,
            ExperimentStatus::Draft | ExperimentStatus::Paused
        ) {
            return Err(DecisionError::InvalidState(format!(
                "cannot start experiment in state {:?}",
                experiment.status
            )));
        }

        let content_type = experiment.content_type.clone();
        let treatment_variant_id = experiment.treatment_variant_id.clone();

        // One running experiment per content type
        if let Some(active_id) = store.active_for(&content_type) {
            if active_id != *id {
                let active_running = store
                    .get(&active_id)
                    .map(|e| e.status == ExperimentStatus::Running)
                    .unwrap_or(false);
                if active_running {
                    return Err(DecisionError::Conflict(format!(
                        "experiment {} is already running for content type {}",
                        active_id, content_type
                    )));
                }
            }
        }

        self.registry.set_as_candidate(&treatment_variant_id).await?;

        let experiment = store
            .get_mut(id)
            .ok_or_else(|| DecisionError::ExperimentNotFound(id.to_string()))?;
        experiment.status = ExperimentStatus::Running;
        if experiment.started_at.is_none() {
            experiment.started_at = Some(Utc::now());
        }
        store.set_active(&content_type, *id);
        drop(store);

        info!(experiment_id = %id, content_type = %content_type, "started experiment");
        self.persist().await;
        Ok(())
    }

    /// Pause a running experiment. Advisory: already-reported metrics are
    /// kept and the active-experiment index is untouched until the next
    /// start or conclude.
    pub async fn pause_experiment(&self, id: &Uuid) -> Result<()> {
        {
            let mut store = self.store.write().await;
            let experiment = store
                .get_mut(id)
                .ok_or_else(|| DecisionError::ExperimentNotFound(id.to_string()))?;

            if experiment.status != ExperimentStatus::Running {
                return Err(DecisionError::InvalidState(format!(
                    "cannot pause experiment in state {:?}",
                    experiment.status
                )));
            }
            experiment.status = ExperimentStatus::Paused;
        }

        info!(experiment_id = %id, "paused experiment");
        self.persist().await;
        Ok(())
    }

    /// Record one generation outcome for a variant.
    ///
    /// Finds the running experiment whose control or treatment arm serves
    /// the variant, accumulates the sample, then re-evaluates the stopping
    /// rules: the 14-day duration cap first, then early conclusion at the
    /// stricter early-stop confidence bar.
    pub async fn record_metric(&self, variant_id: &str, sample: MetricSample) -> Result<()> {
        let (id, analysis_input) = {
            let mut store = self.store.write().await;
            let experiment = store
                .all_mut()
                .find(|e| e.status == ExperimentStatus::Running && e.arm_of(variant_id).is_some())
                .ok_or_else(|| {
                    DecisionError::VariantNotFound(format!(
                        "no running experiment records variant {variant_id}"
                    ))
                })?;

            // arm_of matched above
            let arm = experiment
                .arm_of(variant_id)
                .unwrap_or(Arm::Control);
            experiment.metrics_mut(arm).record(&sample);

            debug!(
                experiment_id = %experiment.id,
                variant_id,
                ?arm,
                success = sample.success,
                "recorded metric"
            );

            let elapsed = experiment
                .running_seconds(Utc::now())
                .unwrap_or(0);
            (
                experiment.id,
                (
                    elapsed,
                    experiment.control_metrics.clone(),
                    experiment.treatment_metrics.clone(),
                ),
            )
        };

        let (elapsed_seconds, control, treatment) = analysis_input;

        if elapsed_seconds >= self.settings.max_duration_seconds as i64 {
            info!(experiment_id = %id, "experiment reached maximum duration");
            self.conclude_experiment(&id, ConclusionReason::MaxDuration)
                .await?;
            return Ok(());
        }

        let analysis = analyze_experiment(&control, &treatment, &self.settings);
        if analysis.has_sufficient_samples
            && analysis.confidence >= self.settings.early_stop_confidence
            && analysis.has_minimum_effect
        {
            info!(
                experiment_id = %id,
                confidence = analysis.confidence,
                "experiment reached early significance"
            );
            self.conclude_experiment(&id, ConclusionReason::EarlySignificance)
                .await?;
            return Ok(());
        }

        self.persist().await;
        Ok(())
    }

    /// Conclude an experiment, snapshotting the analysis into its
    /// conclusion. Idempotent: an already-concluded experiment returns its
    /// existing conclusion. If auto-promotion is configured and the
    /// treatment won, the winner is promoted immediately.
    pub async fn conclude_experiment(
        &self,
        id: &Uuid,
        reason: ConclusionReason,
    ) -> Result<ExperimentConclusion> {
        let (conclusion, auto_promote) = {
            let mut store = self.store.write().await;
            let experiment = store
                .get_mut(id)
                .ok_or_else(|| DecisionError::ExperimentNotFound(id.to_string()))?;

            if matches!(
                experiment.status,
                ExperimentStatus::Concluded | ExperimentStatus::Promoted
            ) {
                if let Some(existing) = experiment.conclusion.clone() {
                    return Ok(existing);
                }
                // terminal state with a missing snapshot: rebuild the
                // conclusion in place, never rewrite the status
                let rebuilt = build_conclusion(experiment, reason, &self.settings);
                experiment.conclusion = Some(rebuilt.clone());
                warn!(experiment_id = %id, "rebuilt missing conclusion on terminal experiment");
                drop(store);
                self.persist().await;
                return Ok(rebuilt);
            }

            let conclusion = build_conclusion(experiment, reason, &self.settings);
            let winner = conclusion.winner;

            experiment.status = ExperimentStatus::Concluded;
            experiment.concluded_at = Some(Utc::now());
            experiment.conclusion = Some(conclusion.clone());

            let content_type = experiment.content_type.clone();
            if store.active_for(&content_type) == Some(*id) {
                store.clear_active(&content_type);
            }

            (conclusion, self.settings.auto_promote && winner == Some(Arm::Treatment))
        };

        info!(
            experiment_id = %id,
            reason = ?conclusion.reason,
            winner = ?conclusion.winner,
            p_value = conclusion.analysis.p_value,
            "concluded experiment"
        );
        self.persist().await;

        if auto_promote {
            self.promote_winner(id).await?;
            // re-read so the returned conclusion carries promoted_at
            let store = self.store.read().await;
            if let Some(updated) = store.get(id).and_then(|e| e.conclusion.clone()) {
                return Ok(updated);
            }
        }

        Ok(conclusion)
    }

    /// Promote a concluded experiment's winning treatment to champion.
    ///
    /// Fails with `InvalidState` unless the experiment is concluded and the
    /// treatment won. The actual champion swap belongs to the registry.
    pub async fn promote_winner(&self, id: &Uuid) -> Result<()> {
        let treatment_variant_id = {
            let store = self.store.read().await;
            let experiment = store
                .get(id)
                .ok_or_else(|| DecisionError::ExperimentNotFound(id.to_string()))?;

            if experiment.status != ExperimentStatus::Concluded {
                return Err(DecisionError::InvalidState(format!(
                    "cannot promote experiment in state {:?}",
                    experiment.status
                )));
            }
            let winner = experiment.conclusion.as_ref().and_then(|c| c.winner);
            if winner != Some(Arm::Treatment) {
                return Err(DecisionError::InvalidState(
                    "experiment winner is not the treatment".to_string(),
                ));
            }
            experiment.treatment_variant_id.clone()
        };

        let swapped = self.registry.promote_to_champion(&treatment_variant_id).await?;
        if !swapped {
            return Err(DecisionError::InvalidState(format!(
                "registry declined promotion of variant {treatment_variant_id}"
            )));
        }

        {
            let mut store = self.store.write().await;
            if let Some(experiment) = store.get_mut(id) {
                experiment.status = ExperimentStatus::Promoted;
                if let Some(conclusion) = experiment.conclusion.as_mut() {
                    conclusion.promoted_at = Some(Utc::now());
                }
            }
        }

        info!(experiment_id = %id, variant_id = %treatment_variant_id, "promoted treatment to champion");
        self.persist().await;
        Ok(())
    }

    /// Run the statistical analysis for an experiment without concluding it
    pub async fn analyze(&self, id: &Uuid) -> Result<ExperimentAnalysis> {
        let store = self.store.read().await;
        let experiment = store
            .get(id)
            .ok_or_else(|| DecisionError::ExperimentNotFound(id.to_string()))?;
        Ok(analyze_experiment(
            &experiment.control_metrics,
            &experiment.treatment_metrics,
            &self.settings,
        ))
    }

    /// Get an experiment by id
    pub async fn get_experiment(&self, id: &Uuid) -> Option<Experiment> {
        self.store.read().await.get(id).cloned()
    }

    /// All experiments, unordered
    pub async fn list_experiments(&self) -> Vec<Experiment> {
        self.store.read().await.all().cloned().collect()
    }

    /// The running experiment for a content type, if any
    pub async fn active_experiment(&self, content_type: &str) -> Option<Experiment> {
        let store = self.store.read().await;
        store
            .active_for(content_type)
            .and_then(|id| store.get(&id))
            .cloned()
    }

    /// Best-effort persistence: a failed save is logged and the in-memory
    /// state stays authoritative until the next successful save.
    async fn persist(&self) {
        let snapshot = self.store.read().await.snapshot();
        if let Err(e) = self.storage.save(&snapshot).await {
            warn!(error = %e, "failed to persist experiment store");
        }
    }
}

/// Snapshot the current analysis into a conclusion for an experiment
fn build_conclusion(
    experiment: &Experiment,
    reason: ConclusionReason,
    settings: &ExperimentSettings,
) -> ExperimentConclusion {
    let analysis = analyze_experiment(
        &experiment.control_metrics,
        &experiment.treatment_metrics,
        settings,
    );
    let winner = analysis.winner;
    let winning_variant_id = winner.map(|arm| experiment.variant_id(arm).to_string());
    let recommended_action = match winner {
        Some(Arm::Treatment) => RecommendedAction::PromoteTreatment,
        Some(Arm::Control) => RecommendedAction::KeepControl,
        None => RecommendedAction::NoChange,
    };

    ExperimentConclusion {
        reason,
        analysis,
        winner,
        winning_variant_id,
        recommended_action,
        promoted_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::VariantFilter;
    use crate::store::NullStorage;
    use async_trait::async_trait;
    use prompt_optimizer_types::variants::{
        CollectedMetrics, Variant, VariantConfig, VariantPerformance, VariantStatus,
    };
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeRegistry {
        variants: Mutex<HashMap<String, Variant>>,
    }

    impl FakeRegistry {
        fn with_pair(content_type: &str) -> Self {
            let registry = Self {
                variants: Mutex::new(HashMap::new()),
            };
            registry.add("champ", content_type, VariantStatus::Champion);
            registry.add("cand", content_type, VariantStatus::Active);
            registry
        }

        fn add(&self, id: &str, content_type: &str, status: VariantStatus) {
            self.variants.lock().unwrap().insert(
                id.to_string(),
                Variant {
                    id: id.to_string(),
                    name: id.to_string(),
                    content_type: content_type.to_string(),
                    prompt_template: "Write something.".to_string(),
                    status,
                    weight: 1.0,
                    performance: VariantPerformance::default(),
                    metadata: HashMap::new(),
                },
            );
        }

        fn status_of(&self, id: &str) -> VariantStatus {
            self.variants.lock().unwrap().get(id).unwrap().status
        }
    }

    #[async_trait]
    impl VariantRegistry for FakeRegistry {
        async fn get(&self, variant_id: &str) -> Result<Option<Variant>> {
            Ok(self.variants.lock().unwrap().get(variant_id).cloned())
        }

        async fn get_by_content_type(
            &self,
            content_type: &str,
            _filter: VariantFilter,
        ) -> Result<Vec<Variant>> {
            Ok(self
                .variants
                .lock()
                .unwrap()
                .values()
                .filter(|v| v.content_type == content_type)
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
                if variant.content_type == content_type
                    && variant.status == VariantStatus::Champion
                {
                    variant.status = VariantStatus::Archived;
                }
            }
            variants.get_mut(variant_id).unwrap().status = VariantStatus::Champion;
            Ok(true)
        }

        async fn register(&self, config: VariantConfig) -> Result<Variant> {
            let variant = Variant {
                id: config.id.clone(),
                name: config.name,
                content_type: config.content_type,
                prompt_template: config.prompt_template,
                status: config.status,
                weight: config.weight,
                performance: VariantPerformance::default(),
                metadata: HashMap::new(),
            };
            self.variants
                .lock()
                .unwrap()
                .insert(config.id, variant.clone());
            Ok(variant)
        }
    }

    // MetricsCollector is unused by the manager but keeps the fake reusable
    #[async_trait]
    impl crate::ports::MetricsCollector for FakeRegistry {
        async fn variant_metrics(&self, _variant_id: &str) -> Result<CollectedMetrics> {
            Ok(CollectedMetrics::default())
        }
    }

    fn manager(registry: Arc<FakeRegistry>) -> ExperimentManager {
        ExperimentManager::new(registry, Arc::new(NullStorage), ExperimentSettings::default())
    }

    fn create_params() -> CreateExperiment {
        CreateExperiment {
            control_variant_id: "champ".to_string(),
            treatment_variant_id: "cand".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_experiment() {
        let registry = Arc::new(FakeRegistry::with_pair("summary"));
        let manager = manager(registry);

        let id = manager.create_experiment(create_params()).await.unwrap();
        let experiment = manager.get_experiment(&id).await.unwrap();

        assert_eq!(experiment.status, ExperimentStatus::Draft);
        assert_eq!(experiment.content_type, "summary");
        assert_eq!(experiment.name, "champ vs cand");
        assert!(manager.active_experiment("summary").await.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_variant() {
        let registry = Arc::new(FakeRegistry::with_pair("summary"));
        let manager = manager(registry);

        let mut params = create_params();
        params.treatment_variant_id = "ghost".to_string();
        let err = manager.create_experiment(params).await.unwrap_err();
        assert!(matches!(err, DecisionError::VariantNotFound(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_content_type_mismatch() {
        let registry = Arc::new(FakeRegistry::with_pair("summary"));
        registry.add("other", "email", VariantStatus::Active);
        let manager = manager(registry);

        let mut params = create_params();
        params.treatment_variant_id = "other".to_string();
        let err = manager.create_experiment(params).await.unwrap_err();
        assert!(matches!(err, DecisionError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_traffic_split() {
        let registry = Arc::new(FakeRegistry::with_pair("summary"));
        let manager = manager(registry);

        let mut params = create_params();
        params.traffic_split = Some(TrafficSplit::new(0.7, 0.7));
        let err = manager.create_experiment(params).await.unwrap_err();
        assert!(matches!(err, DecisionError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_start_marks_candidate_and_registers_active() {
        let registry = Arc::new(FakeRegistry::with_pair("summary"));
        let manager = manager(registry.clone());

        let id = manager.create_experiment(create_params()).await.unwrap();
        manager.start_experiment(&id).await.unwrap();

        let experiment = manager.get_experiment(&id).await.unwrap();
        assert_eq!(experiment.status, ExperimentStatus::Running);
        assert!(experiment.started_at.is_some());
        assert_eq!(registry.status_of("cand"), VariantStatus::Candidate);
        assert_eq!(
            manager.active_experiment("summary").await.unwrap().id,
            id
        );
    }

    #[tokio::test]
    async fn test_no_second_running_experiment_per_content_type() {
        let registry = Arc::new(FakeRegistry::with_pair("summary"));
        registry.add("cand2", "summary", VariantStatus::Active);
        let manager = manager(registry);

        let first = manager.create_experiment(create_params()).await.unwrap();
        manager.start_experiment(&first).await.unwrap();

        let mut params = create_params();
        params.treatment_variant_id = "cand2".to_string();
        let second = manager.create_experiment(params).await.unwrap();

        let err = manager.start_experiment(&second).await.unwrap_err();
        assert!(matches!(err, DecisionError::Conflict(_)));

        // Once the first leaves running the second may start
        manager.pause_experiment(&first).await.unwrap();
        manager.start_experiment(&second).await.unwrap();

        // And now the paused one cannot come back while the second runs
        let err = manager.start_experiment(&first).await.unwrap_err();
        assert!(matches!(err, DecisionError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_pause_requires_running() {
        let registry = Arc::new(FakeRegistry::with_pair("summary"));
        let manager = manager(registry);

        let id = manager.create_experiment(create_params()).await.unwrap();
        let err = manager.pause_experiment(&id).await.unwrap_err();
        assert!(matches!(err, DecisionError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_record_metric_accumulates_per_arm() {
        let registry = Arc::new(FakeRegistry::with_pair("summary"));
        let manager = manager(registry);

        let id = manager.create_experiment(create_params()).await.unwrap();
        manager.start_experiment(&id).await.unwrap();

        manager
            .record_metric(
                "champ",
                MetricSample {
                    success: true,
                    latency_ms: Some(900.0),
                    quality_score: Some(0.8),
                    feedback: None,
                },
            )
            .await
            .unwrap();
        manager
            .record_metric("cand", MetricSample { success: false, ..Default::default() })
            .await
            .unwrap();

        let experiment = manager.get_experiment(&id).await.unwrap();
        assert_eq!(experiment.control_metrics.impressions, 1);
        assert_eq!(experiment.control_metrics.successes, 1);
        assert_eq!(experiment.treatment_metrics.failures, 1);
    }

    #[tokio::test]
    async fn test_record_metric_unknown_variant() {
        let registry = Arc::new(FakeRegistry::with_pair("summary"));
        let manager = manager(registry);

        let err = manager
            .record_metric("ghost", MetricSample::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DecisionError::VariantNotFound(_)));
    }

    #[tokio::test]
    async fn test_early_significance_concludes_and_promotes() {
        let registry = Arc::new(FakeRegistry::with_pair("summary"));
        let manager = manager(registry.clone());

        let id = manager.create_experiment(create_params()).await.unwrap();
        manager.start_experiment(&id).await.unwrap();

        // Control converts rarely, treatment almost always
        for i in 0..100 {
            manager
                .record_metric(
                    "champ",
                    MetricSample { success: i % 10 < 3, ..Default::default() },
                )
                .await
                .unwrap();
            manager
                .record_metric(
                    "cand",
                    MetricSample { success: i % 10 < 9, ..Default::default() },
                )
                .await
                .unwrap();
            if manager.get_experiment(&id).await.unwrap().status != ExperimentStatus::Running {
                break;
            }
        }

        let experiment = manager.get_experiment(&id).await.unwrap();
        assert_eq!(experiment.status, ExperimentStatus::Promoted);
        let conclusion = experiment.conclusion.unwrap();
        assert_eq!(conclusion.reason, ConclusionReason::EarlySignificance);
        assert_eq!(conclusion.winner, Some(Arm::Treatment));
        assert_eq!(conclusion.winning_variant_id.as_deref(), Some("cand"));
        assert!(conclusion.promoted_at.is_some());
        assert_eq!(registry.status_of("cand"), VariantStatus::Champion);

        // The content type is free again
        assert!(manager.active_experiment("summary").await.is_none());
    }

    #[tokio::test]
    async fn test_conclude_is_idempotent() {
        let registry = Arc::new(FakeRegistry::with_pair("summary"));
        let manager = manager(registry);

        let id = manager.create_experiment(create_params()).await.unwrap();
        manager.start_experiment(&id).await.unwrap();

        let first = manager
            .conclude_experiment(&id, ConclusionReason::Manual)
            .await
            .unwrap();
        let second = manager
            .conclude_experiment(&id, ConclusionReason::MaxDuration)
            .await
            .unwrap();

        // The original conclusion is returned unchanged
        assert_eq!(second.reason, ConclusionReason::Manual);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_promote_requires_treatment_winner() {
        let registry = Arc::new(FakeRegistry::with_pair("summary"));
        let manager = manager(registry);

        let id = manager.create_experiment(create_params()).await.unwrap();
        manager.start_experiment(&id).await.unwrap();

        // No winner: too few samples
        manager
            .conclude_experiment(&id, ConclusionReason::Manual)
            .await
            .unwrap();
        let err = manager.promote_winner(&id).await.unwrap_err();
        assert!(matches!(err, DecisionError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_promote_requires_concluded_state() {
        let registry = Arc::new(FakeRegistry::with_pair("summary"));
        let manager = manager(registry);

        let id = manager.create_experiment(create_params()).await.unwrap();
        let err = manager.promote_winner(&id).await.unwrap_err();
        assert!(matches!(err, DecisionError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_control_winner_is_not_promoted() {
        let registry = Arc::new(FakeRegistry::with_pair("summary"));
        let manager = manager(registry.clone());

        let id = manager.create_experiment(create_params()).await.unwrap();
        manager.start_experiment(&id).await.unwrap();

        for _ in 0..60 {
            manager
                .record_metric("champ", MetricSample { success: true, ..Default::default() })
                .await
                .unwrap();
            manager
                .record_metric("cand", MetricSample { success: false, ..Default::default() })
                .await
                .unwrap();
            if manager.get_experiment(&id).await.unwrap().status != ExperimentStatus::Running {
                break;
            }
        }

        let experiment = manager.get_experiment(&id).await.unwrap();
        assert_eq!(experiment.status, ExperimentStatus::Concluded);
        let conclusion = experiment.conclusion.unwrap();
        assert_eq!(conclusion.winner, Some(Arm::Control));
        assert_eq!(conclusion.recommended_action, RecommendedAction::KeepControl);
        assert_eq!(registry.status_of("champ"), VariantStatus::Champion);

        let err = manager.promote_winner(&id).await.unwrap_err();
        assert!(matches!(err, DecisionError::InvalidState(_)));
    }
}
