//! Pipeline configuration.
//!
//! Every setting has a default, so an empty JSON object is a valid
//! configuration file. Values are checked by [`PipelineConfig::validate`],
//! which [`PipelineConfig::from_file`] calls after parsing.
//!
//! # Examples
//!
//! ```
//! use relief::config::PipelineConfig;
//!
//! let config: PipelineConfig = serde_json::from_str(r#"{
//!     "training": { "cv_folds": 3, "grid": { "c_values": [0.5, 1.0] } }
//! }"#).unwrap();
//!
//! assert_eq!(config.training.cv_folds, 3);
//! assert_eq!(config.training.grid.ngram_ranges.len(), 2);
//! assert_eq!(config.etl.table_name, "Disaster-Response");
//! assert!(config.validate().is_ok());
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dataset::loader::JoinPolicy;
use crate::dataset::store::DEFAULT_TABLE_NAME;
use crate::error::{ReliefError, Result};
use crate::ml::evaluation::Scoring;
use crate::ml::grid_search::ParamSet;
use crate::ml::svm::SvmConfig;
use crate::ml::tfidf::NgramRange;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub etl: EtlConfig,
    pub training: TrainingConfig,
}

impl PipelineConfig {
    /// Load and validate a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.etl.validate()?;
        self.training.validate()
    }
}

/// Settings of the ETL stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub table_name: String,
    pub join_policy: JoinPolicy,
}

impl Default for EtlConfig {
    fn default() -> Self {
        EtlConfig {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            join_policy: JoinPolicy::Left,
        }
    }
}

impl EtlConfig {
    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(ReliefError::invalid_config("table_name must not be empty"));
        }
        Ok(())
    }
}

/// Hyperparameter grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub ngram_ranges: Vec<NgramRange>,
    pub c_values: Vec<f64>,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            ngram_ranges: vec![NgramRange::unigrams(), NgramRange::up_to_bigrams()],
            c_values: vec![1.0],
        }
    }
}

impl GridConfig {
    /// Every combination, n-gram range outermost, in declaration order.
    pub fn param_sets(&self) -> Vec<ParamSet> {
        self.ngram_ranges
            .iter()
            .flat_map(|&ngram_range| {
                self.c_values
                    .iter()
                    .map(move |&c| ParamSet { ngram_range, c })
            })
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.ngram_ranges.is_empty() || self.c_values.is_empty() {
            return Err(ReliefError::invalid_config(
                "grid needs at least one n-gram range and one C value",
            ));
        }
        if let Some(c) = self.c_values.iter().find(|c| !(c.is_finite() && **c > 0.0)) {
            return Err(ReliefError::invalid_config(format!(
                "C values must be positive numbers, got {c}"
            )));
        }
        Ok(())
    }
}

/// Settings of the training stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fraction of the dataset held out for evaluation.
    pub test_size: f64,
    pub seed: u64,
    pub cv_folds: usize,
    pub scoring: Scoring,
    pub grid: GridConfig,
    pub svm: SvmConfig,
    pub min_df: usize,
    /// Worker threads for the grid search; 0 means one per CPU.
    pub n_jobs: usize,
    /// Fit a constant predictor for categories that never vary instead of failing.
    pub allow_constant_labels: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            test_size: 0.2,
            seed: 42,
            cv_folds: 5,
            scoring: Scoring::SubsetAccuracy,
            grid: GridConfig::default(),
            svm: SvmConfig::default(),
            min_df: 1,
            n_jobs: 0,
            allow_constant_labels: false,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(ReliefError::invalid_config(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.cv_folds < 2 {
            return Err(ReliefError::invalid_config(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if self.min_df == 0 {
            return Err(ReliefError::invalid_config("min_df must be at least 1"));
        }
        self.grid.validate()?;
        self.svm.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.etl.join_policy, JoinPolicy::Left);
        assert_eq!(config.training.test_size, 0.2);
        assert_eq!(config.training.cv_folds, 5);
        assert_eq!(config.training.scoring, Scoring::SubsetAccuracy);
        assert_eq!(
            config.training.grid.ngram_ranges,
            vec![NgramRange::unigrams(), NgramRange::new(1, 2).unwrap()]
        );
    }

    #[test]
    fn test_param_sets_order() {
        let grid = GridConfig {
            ngram_ranges: vec![NgramRange::unigrams(), NgramRange::new(1, 2).unwrap()],
            c_values: vec![0.1, 1.0],
        };
        let sets = grid.param_sets();
        assert_eq!(sets.len(), 4);
        assert_eq!(sets[0].ngram_range, NgramRange::unigrams());
        assert_eq!(sets[1].c, 1.0);
        assert_eq!(sets[2].ngram_range, NgramRange::new(1, 2).unwrap());
    }

    #[test]
    fn test_json_round_trip_and_validation() {
        let json = r#"{"etl": {"join_policy": "inner"}, "training": {"scoring": "macro_f1", "grid": {"ngram_ranges": [[1, 3]]}}}"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.etl.join_policy, JoinPolicy::Inner);
        assert_eq!(config.training.scoring, Scoring::MacroF1);
        assert_eq!(config.training.grid.ngram_ranges, vec![NgramRange::new(1, 3).unwrap()]);

        let bad_range = r#"{"training": {"grid": {"ngram_ranges": [[2, 1]]}}}"#;
        assert!(serde_json::from_str::<PipelineConfig>(bad_range).is_err());

        let mut config = PipelineConfig::default();
        config.training.test_size = 1.5;
        assert!(matches!(config.validate(), Err(ReliefError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relief.json");
        std::fs::write(&path, r#"{"training": {"seed": 7, "cv_folds": 1}}"#).unwrap();
        assert!(matches!(
            PipelineConfig::from_file(&path),
            Err(ReliefError::InvalidConfig(_))
        ));

        std::fs::write(&path, r#"{"training": {"seed": 7}}"#).unwrap();
        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.training.seed, 7);
    }
}
