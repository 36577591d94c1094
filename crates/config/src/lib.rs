//! Configuration management for the prompt auto-optimizer

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use prompt_optimizer_types::strategies::{ExperimentSettings, GeneratorSettings};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main optimizer configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OptimizerConfig {
    /// Service configuration
    pub service: ServiceConfig,

    /// Experiment store configuration
    pub store: StoreConfig,

    /// Statistical decision thresholds
    pub experiments: ExperimentSettings,

    /// Variant generator tuning
    pub generator: GeneratorSettings,
}

impl OptimizerConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        }

        // Environment variables prefixed with OPTIMIZER_ override the file
        figment = figment.merge(Env::prefixed("OPTIMIZER_").split("__"));

        figment
            .extract()
            .map_err(|e| ConfigError::LoadError(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let exp = &self.experiments;
        if exp.significance_level <= 0.0 || exp.significance_level >= 1.0 {
            return Err(ConfigError::ValidationError(
                "significance_level must be between 0 and 1".to_string(),
            ));
        }
        if exp.early_stop_confidence <= 1.0 - exp.significance_level {
            return Err(ConfigError::ValidationError(
                "early_stop_confidence must be stricter than the standard threshold".to_string(),
            ));
        }
        if exp.min_sample_size == 0 {
            return Err(ConfigError::ValidationError(
                "min_sample_size must be greater than 0".to_string(),
            ));
        }

        let gen = &self.generator;
        if !(0.0..=1.0).contains(&gen.candidate_weight) {
            return Err(ConfigError::ValidationError(
                "candidate_weight must be between 0 and 1".to_string(),
            ));
        }
        if gen.max_variants_per_type == 0 {
            return Err(ConfigError::ValidationError(
                "max_variants_per_type must be greater than 0".to_string(),
            ));
        }
        if gen.history_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "history_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Service configuration for the host process and evolution scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    pub name: String,

    /// Evolution scheduler tick interval in seconds
    pub evolution_interval_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "prompt-auto-optimizer".to_string(),
            evolution_interval_secs: 900, // 15 minutes
        }
    }
}

/// Experiment store persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the durable experiment store file
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/experiments.json"),
        }
    }
}
