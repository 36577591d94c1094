//! In-memory experiment store and its persistence port
//!
//! The store keeps three indices that must stay consistent: experiments by
//! id, experiment ids by content type, and the single running experiment
//! per content type. It is a plain struct; the experiment manager owns it
//! behind one lock so all indices mutate together.
//!
//! Durability is a best-effort feature behind the `ExperimentStorage`
//! trait: a failed load yields a cold start, a failed save leaves the
//! in-memory state authoritative.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prompt_optimizer_types::experiments::{Experiment, ExperimentStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Version written into store snapshots
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Durable form of the experiment store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub experiments: Vec<Experiment>,
}

/// Persistence port for the experiment store
///
/// Implementations decide durability policy; callers decide what a failed
/// load or save means. The core treats both as soft failures.
#[async_trait]
pub trait ExperimentStorage: Send + Sync {
    /// Load the last snapshot, `None` when nothing was persisted yet
    async fn load(&self) -> StorageResult<Option<StoreSnapshot>>;

    /// Persist a snapshot
    async fn save(&self, snapshot: &StoreSnapshot) -> StorageResult<()>;
}

/// JSON file storage backend
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ExperimentStorage for JsonFileStorage {
    async fn load(&self) -> StorageResult<Option<StoreSnapshot>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let snapshot = serde_json::from_slice(&bytes)?;
                Ok(Some(snapshot))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, snapshot: &StoreSnapshot) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write-then-rename so a crash mid-save never truncates the store
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), experiments = snapshot.experiments.len(), "saved experiment store");
        Ok(())
    }
}

/// No-op storage for ephemeral stores and tests
pub struct NullStorage;

#[async_trait]
impl ExperimentStorage for NullStorage {
    async fn load(&self) -> StorageResult<Option<StoreSnapshot>> {
        Ok(None)
    }

    async fn save(&self, _snapshot: &StoreSnapshot) -> StorageResult<()> {
        Ok(())
    }
}

/// In-memory table of experiments with by-id, by-content-type, and
/// active-per-content-type indices
#[derive(Debug, Default)]
pub struct ExperimentStore {
    experiments: HashMap<Uuid, Experiment>,
    by_content_type: HashMap<String, Vec<Uuid>>,
    active: HashMap<String, Uuid>,
}

impl ExperimentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new experiment into both static indices
    pub fn insert(&mut self, experiment: Experiment) {
        self.by_content_type
            .entry(experiment.content_type.clone())
            .or_default()
            .push(experiment.id);
        self.experiments.insert(experiment.id, experiment);
    }

    pub fn get(&self, id: &Uuid) -> Option<&Experiment> {
        self.experiments.get(id)
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut Experiment> {
        self.experiments.get_mut(id)
    }

    /// Id of the running experiment for a content type, if any
    pub fn active_for(&self, content_type: &str) -> Option<Uuid> {
        self.active.get(content_type).copied()
    }

    /// Register an experiment as the running one for its content type
    pub fn set_active(&mut self, content_type: &str, id: Uuid) {
        self.active.insert(content_type.to_string(), id);
    }

    /// Drop the active registration for a content type
    pub fn clear_active(&mut self, content_type: &str) {
        self.active.remove(content_type);
    }

    /// All experiments, unordered
    pub fn all(&self) -> impl Iterator<Item = &Experiment> {
        self.experiments.values()
    }

    /// Mutable view over all experiments, unordered
    pub fn all_mut(&mut self) -> impl Iterator<Item = &mut Experiment> {
        self.experiments.values_mut()
    }

    /// Experiments for one content type, in insertion order
    pub fn by_content_type(&self, content_type: &str) -> Vec<&Experiment> {
        self.by_content_type
            .get(content_type)
            .map(|ids| ids.iter().filter_map(|id| self.experiments.get(id)).collect())
            .unwrap_or_default()
    }

    /// Snapshot the store for persistence
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            experiments: self.experiments.values().cloned().collect(),
        }
    }

    /// Rebuild the store from a snapshot.
    ///
    /// Any experiment loaded with `Running` status is re-registered as the
    /// active experiment for its content type, restoring the invariant
    /// after a restart.
    pub fn restore(&mut self, snapshot: StoreSnapshot) {
        self.experiments.clear();
        self.by_content_type.clear();
        self.active.clear();

        for experiment in snapshot.experiments {
            if experiment.status == ExperimentStatus::Running {
                self.active
                    .insert(experiment.content_type.clone(), experiment.id);
            }
            self.insert(experiment);
        }
    }
}
